//! Persisted, newest-first history of submission stages.
//!
//! The history file is a JSON array of stages:
//!
//! ```json
//! [{"index": 1, "commonCalendar": "primary",
//!   "events": [{"calendarID": "primary", "eventID": "abc"}]}]
//! ```

use crate::error::{Error, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Identifies one remote event: both fields take part in equality and hashing
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdPair {
    #[serde(rename = "calendarID")]
    pub calendar_id: String,
    #[serde(rename = "eventID")]
    pub event_id: String,
}

impl IdPair {
    pub fn new(calendar_id: impl Into<String>, event_id: impl Into<String>) -> Self {
        Self { calendar_id: calendar_id.into(), event_id: event_id.into() }
    }
}

/// One submission batch, all of it against a single calendar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub index: u64,
    #[serde(rename = "commonCalendar")]
    pub common_calendar: String,
    events: Vec<IdPair>,
}

impl Stage {
    pub fn new(index: u64, common_calendar: impl Into<String>) -> Self {
        Self { index, common_calendar: common_calendar.into(), events: Vec::new() }
    }

    /// Record a created event; the pair always targets the stage's calendar
    pub fn push(&mut self, event_id: impl Into<String>) {
        self.events.push(IdPair::new(self.common_calendar.clone(), event_id));
    }

    pub fn events(&self) -> &[IdPair] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Keep only the events from `from` onward
    pub(crate) fn retain_from(&mut self, from: usize) {
        self.events.drain(..from.min(self.events.len()));
    }
}

/// Ordered stage history backed by a JSON file
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    stages: Vec<Stage>,
}

impl HistoryStore {
    /// Start an empty history that will be saved at `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), stages: Vec::new() }
    }

    /// Read the history file. A missing file is an empty history; unreadable
    /// or inconsistent contents are an error for the caller to handle.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            debug!("No history at {}, starting empty", path.display());
            return Ok(Self::empty(path));
        }

        let content = fs::read_to_string(&path).map_err(|e| Error::storage(&path, e))?;
        let stages: Vec<Stage> = serde_json::from_str(&content)
            .map_err(|e| Error::CorruptHistory { path: path.clone(), reason: e.to_string() })?;
        validate(&path, &stages)?;

        debug!("Loaded {} stages from {}", stages.len(), path.display());
        Ok(Self { path, stages })
    }

    /// Write the whole history, replacing the file atomically
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::storage(parent, e))?;
            }
        }
        let json = serde_json::to_string_pretty(&self.stages)
            .map_err(|e| Error::storage(&self.path, e.into()))?;
        atomic_write(&self.path, json)?;
        debug!("Saved {} stages to {}", self.stages.len(), self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Index the next stage must carry
    pub fn next_index(&self) -> u64 {
        self.stages.first().map_or(0, |front| front.index + 1)
    }

    /// Push a stage as the newest. Its index must come from [`next_index`].
    ///
    /// [`next_index`]: HistoryStore::next_index
    pub fn add_stage(&mut self, stage: Stage) -> Result<()> {
        let expected = self.next_index();
        if stage.index != expected {
            return Err(Error::StageOutOfOrder { expected, found: stage.index });
        }
        self.stages.insert(0, stage);
        Ok(())
    }

    /// Put a stage just taken by [`pop`] back in front, keeping its index.
    ///
    /// [`pop`]: HistoryStore::pop
    pub(crate) fn restore(&mut self, stage: Stage) {
        self.stages.insert(0, stage);
    }

    /// Remove and return the newest stage
    pub fn pop(&mut self) -> Result<Stage> {
        if self.stages.is_empty() {
            return Err(Error::EmptyHistory);
        }
        Ok(self.stages.remove(0))
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Number of tracked events across every stage
    pub fn total(&self) -> usize {
        self.stages.iter().map(Stage::len).sum()
    }

    /// Index of the stage that created `pair`, searching newest first
    pub fn exists(&self, pair: &IdPair) -> Option<u64> {
        self.stages.iter().find(|stage| stage.events.contains(pair)).map(|stage| stage.index)
    }

    /// Every tracked pair, newest stage first
    pub fn all_pairs(&self) -> impl Iterator<Item = &IdPair> + '_ {
        self.stages.iter().flat_map(|stage| stage.events.iter())
    }
}

fn validate(path: &Path, stages: &[Stage]) -> Result<()> {
    let corrupt = |reason: String| Error::CorruptHistory { path: path.to_path_buf(), reason };

    for pair in stages.windows(2) {
        if pair[0].index <= pair[1].index {
            return Err(corrupt(format!(
                "stage {} is stored before stage {}",
                pair[0].index, pair[1].index
            )));
        }
    }
    for stage in stages {
        if let Some(stray) = stage.events.iter().find(|p| p.calendar_id != stage.common_calendar) {
            return Err(corrupt(format!(
                "stage {} targets {} but holds an event from {}",
                stage.index, stage.common_calendar, stray.calendar_id
            )));
        }
    }
    Ok(())
}

/// Write to a sibling .tmp file, then rename over the target
fn atomic_write(path: &Path, contents: String) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, contents).map_err(|e| Error::storage(&tmp_path, e))?;
    fs::rename(&tmp_path, path).map_err(|e| Error::storage(path, e))?;
    Ok(())
}
