//! Classification of every known event into ready, undoable and foreign.

use crate::calendar::RemoteEvent;
use crate::error::Result;
use crate::event::Event;
use crate::history::{HistoryStore, IdPair};
use std::collections::HashSet;
use std::fmt;

/// Counts for the current view. The three classes are disjoint: ready events
/// have no remote id yet, and remote ids are split by history membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Parsed, not yet submitted
    pub ready: usize,
    /// Tracked by history on any calendar
    pub undoable: usize,
    /// Tracked events that appear in the fetched calendar
    pub undoable_in_view: usize,
    /// Fetched events that history does not track
    pub foreign: Vec<IdPair>,
}

impl Reconciliation {
    pub fn total(&self) -> usize {
        self.ready + self.undoable + self.foreign.len()
    }
}

impl fmt::Display for Reconciliation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ready, {} undoable, {} foreign ({} total)",
            self.ready,
            self.undoable,
            self.foreign.len(),
            self.total()
        )
    }
}

/// Classify the ready list and one calendar's fetched events against history.
///
/// Membership is decided on the full `(calendar, event)` pair, so an id
/// tracked for another calendar never hides a foreign event here.
pub fn reconcile(
    ready: &[Event],
    calendar_id: &str,
    remote: &[RemoteEvent],
    history: &HistoryStore,
) -> Reconciliation {
    let tracked: HashSet<&IdPair> = history.all_pairs().collect();
    let mut seen = HashSet::new();
    let mut foreign = Vec::new();
    let mut undoable_in_view = 0;

    for event in remote {
        let pair = IdPair::new(calendar_id, event.id.as_str());
        if !seen.insert(pair.clone()) {
            continue;
        }
        if tracked.contains(&pair) {
            undoable_in_view += 1;
        } else {
            foreign.push(pair);
        }
    }

    Reconciliation { ready: ready.len(), undoable: history.total(), undoable_in_view, foreign }
}

/// Display rows: ready events first, then fetched events labelled by provenance
pub fn rows(
    ready: &[Event],
    calendar_id: &str,
    remote: &[RemoteEvent],
    history: &HistoryStore,
) -> Result<Vec<Event>> {
    let mut rows = ready.to_vec();
    for event in remote {
        rows.push(Event::from_remote(event, calendar_id, Some(history))?);
    }
    Ok(rows)
}
