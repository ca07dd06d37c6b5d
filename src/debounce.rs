//! Debounced re-parsing of text that is still being edited.

use crate::parser::{self, ParseOutcome};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Fire-once timer: every `schedule` replaces the pending task and restarts
/// the quiet period. Requires a running tokio runtime.
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self { delay, generation: Arc::new(AtomicU64::new(0)), pending: None }
    }

    /// Run `task` once `delay` has passed without another call to `schedule`
    pub fn schedule<F>(&mut self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let ticket = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let delay = self.delay;

        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // A newer schedule or a cancel invalidates this ticket even after wake-up
            if generation.load(Ordering::SeqCst) == ticket {
                task();
            }
        }));
    }

    /// Drop the pending task, if any. Returns whether one was still waiting.
    pub fn cancel(&mut self) -> bool {
        self.generation.fetch_add(1, Ordering::SeqCst);
        match self.pending.take() {
            Some(handle) => {
                let waiting = !handle.is_finished();
                handle.abort();
                waiting
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

type Listener = Arc<dyn Fn(&ParseOutcome) + Send + Sync>;

/// Keeps the parse of an edited text current without parsing on every keystroke
pub struct LiveParse {
    debouncer: Debouncer,
    latest: Arc<Mutex<ParseOutcome>>,
    parses: Arc<AtomicUsize>,
    listener: Option<Listener>,
}

impl LiveParse {
    pub fn new(delay: Duration) -> Self {
        Self {
            debouncer: Debouncer::new(delay),
            latest: Arc::new(Mutex::new(ParseOutcome::default())),
            parses: Arc::new(AtomicUsize::new(0)),
            listener: None,
        }
    }

    /// Call `listener` with every completed parse
    pub fn on_parsed<F>(mut self, listener: F) -> Self
    where
        F: Fn(&ParseOutcome) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// The text changed; parse it once edits settle
    pub fn edited(&mut self, text: String) {
        let latest = Arc::clone(&self.latest);
        let parses = Arc::clone(&self.parses);
        let listener = self.listener.clone();
        self.debouncer.schedule(move || {
            let outcome = parser::parse(&text);
            parses.fetch_add(1, Ordering::SeqCst);
            if let Some(listener) = listener {
                listener(&outcome);
            }
            *latest.lock().unwrap_or_else(PoisonError::into_inner) = outcome;
        });
    }

    /// Discard any pending parse and parse `text` now
    pub fn flush(&mut self, text: &str) -> ParseOutcome {
        self.debouncer.cancel();
        let outcome = parser::parse(text);
        self.parses.fetch_add(1, Ordering::SeqCst);
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = outcome.clone();
        outcome
    }

    pub fn latest(&self) -> ParseOutcome {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    /// Parses run so far
    pub fn parse_count(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }
}
