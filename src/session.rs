//! Submission and undo against one remote calendar, with history kept durable
//! after every step that changes it.

use crate::calendar::{CalendarEntry, CalendarService, RemoteEvent};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::history::{HistoryStore, Stage};
use crate::reconcile::{self, Reconciliation};
use chrono::Utc;
use log::{debug, info, warn};

pub struct Session<C: CalendarService> {
    calendar: C,
    history: HistoryStore,
    active_calendar: Option<String>,
    ready: Vec<Event>,
    remote: Vec<RemoteEvent>,
    max_results: u32,
}

impl<C: CalendarService> Session<C> {
    pub fn new(calendar: C, history: HistoryStore, max_results: u32) -> Self {
        Self {
            calendar,
            history,
            active_calendar: None,
            ready: Vec::new(),
            remote: Vec::new(),
            max_results,
        }
    }

    pub fn calendar(&self) -> &C {
        &self.calendar
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn active_calendar(&self) -> Option<&str> {
        self.active_calendar.as_deref()
    }

    pub fn ready(&self) -> &[Event] {
        &self.ready
    }

    /// Replace the ready list with the latest parse
    pub fn set_ready(&mut self, events: Vec<Event>) {
        self.ready = events;
    }

    pub async fn list_calendars(&self) -> Result<Vec<CalendarEntry>> {
        Ok(self.calendar.list_calendars().await?)
    }

    /// Make `calendar_id` the submission target and fetch its events
    pub async fn select_calendar(&mut self, calendar_id: impl Into<String>) -> Result<()> {
        let calendar_id = calendar_id.into();
        if self.active_calendar.as_deref() != Some(calendar_id.as_str()) {
            self.remote.clear();
        }
        self.active_calendar = Some(calendar_id);
        self.refresh().await
    }

    /// Re-fetch upcoming events of the active calendar
    pub async fn refresh(&mut self) -> Result<()> {
        let calendar_id = self.active_calendar.as_deref().ok_or(Error::NoActiveCalendar)?;
        let events = self
            .calendar
            .list_events(calendar_id, Utc::now(), self.max_results, true)
            .await?;
        debug!("Fetched {} events from {}", events.len(), calendar_id);
        self.remote = events;
        Ok(())
    }

    /// Create every ready event on the active calendar as one new stage.
    ///
    /// `progress` is called with `(done, total)` after each created event.
    /// Returns the new stage's index, or `None` when nothing was ready. If a
    /// call fails, the events created so far are still recorded as the stage
    /// and the rest stay ready. The remote fetch is not refreshed.
    pub async fn submit<F>(&mut self, mut progress: F) -> Result<Option<u64>>
    where
        F: FnMut(usize, usize),
    {
        if self.ready.is_empty() {
            return Ok(None);
        }
        let calendar_id = self.active_calendar.clone().ok_or(Error::NoActiveCalendar)?;

        let total = self.ready.len();
        let mut stage = Stage::new(self.history.next_index(), calendar_id.as_str());
        let mut failure = None;

        for event in &self.ready {
            match self.calendar.insert_event(&calendar_id, &event.submission_body()).await {
                Ok(created) => {
                    debug!("Created {:?} as {}", event.summary(), created.id);
                    stage.push(created.id);
                    progress(stage.len(), total);
                }
                Err(e) => {
                    warn!("Submission stopped after {} of {} events: {}", stage.len(), total, e);
                    failure = Some(e);
                    break;
                }
            }
        }

        let created = stage.len();
        let index = stage.index;
        self.ready.drain(..created);
        if !stage.is_empty() {
            self.history.add_stage(stage)?;
            self.history.save()?;
            info!("Stage {} holds {} events on {}", index, created, calendar_id);
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(Some(index)),
        }
    }

    /// Delete every event of the newest stage from its own calendar.
    ///
    /// Stops at the first failed delete; the events not yet deleted are put
    /// back under the same stage index so a later undo picks them up.
    pub async fn undo<F>(&mut self, mut progress: F) -> Result<Stage>
    where
        F: FnMut(usize, usize),
    {
        let stage = self.history.pop()?;
        let total = stage.len();

        let mut failure = None;
        for (done, pair) in stage.events().iter().enumerate() {
            if let Err(e) = self.calendar.delete_event(&stage.common_calendar, &pair.event_id).await
            {
                failure = Some((done, e));
                break;
            }
            progress(done + 1, total);
        }

        if let Some((done, e)) = failure {
            warn!("Undo of stage {} stopped after {} of {} events: {}", stage.index, done, total, e);
            let mut remainder = stage;
            remainder.retain_from(done);
            self.history.restore(remainder);
            self.history.save()?;
            return Err(e.into());
        }

        self.history.save()?;
        info!("Undid stage {} ({} events on {})", stage.index, total, stage.common_calendar);
        Ok(stage)
    }

    /// Counts for the ready list and the active calendar's fetched events
    pub fn status(&self) -> Reconciliation {
        let calendar_id = self.active_calendar.as_deref().unwrap_or_default();
        reconcile::reconcile(&self.ready, calendar_id, &self.remote, &self.history)
    }

    /// Ready events followed by fetched events labelled with their provenance
    pub fn rows(&self) -> Result<Vec<Event>> {
        let calendar_id = self.active_calendar.as_deref().unwrap_or_default();
        reconcile::rows(&self.ready, calendar_id, &self.remote, &self.history)
    }
}
