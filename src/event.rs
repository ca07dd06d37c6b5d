//! Normalized calendar event record and its remote projections.

use crate::calendar::{EventBody, RemoteEvent, TimePayload};
use crate::error::{Error, Result};
use crate::history::{HistoryStore, IdPair};
use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone};
use std::fmt;

const DATE_DISPLAY: &str = "%b %d, %Y";
const DATE_TIME_DISPLAY: &str = "%b %d, %Y %I:%M %p";

/// Start or end of an event: a whole day, or an instant with its UTC offset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTime {
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl EventTime {
    /// Pin a wall-clock time to the local system timezone.
    ///
    /// Returns `None` for wall-clock times skipped by a DST transition.
    pub fn from_local(naive: NaiveDateTime) -> Option<Self> {
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| EventTime::DateTime(dt.with_timezone(&dt.offset().fix())))
    }

    pub fn is_date_time(&self) -> bool {
        matches!(self, EventTime::DateTime(_))
    }

    pub fn to_payload(&self) -> TimePayload {
        match *self {
            EventTime::Date(date) => TimePayload::Date { date },
            EventTime::DateTime(date_time) => TimePayload::DateTime { date_time },
        }
    }
}

impl From<TimePayload> for EventTime {
    fn from(payload: TimePayload) -> Self {
        match payload {
            TimePayload::Date { date } => EventTime::Date(date),
            TimePayload::DateTime { date_time } => EventTime::DateTime(date_time),
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::Date(date) => write!(f, "{}", date.format(DATE_DISPLAY)),
            EventTime::DateTime(dt) => write!(f, "{}", dt.format(DATE_TIME_DISPLAY)),
        }
    }
}

/// Where an event shown to the user came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Parsed locally, not yet submitted
    Ready,
    /// Created by the submission stage with this index
    Stage(u64),
    /// On the remote calendar but unknown to local history
    Foreign,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Ready => write!(f, "Ready"),
            Provenance::Stage(index) => write!(f, "Stage {}", index),
            Provenance::Foreign => write!(f, "Foreign"),
        }
    }
}

/// An immutable calendar event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    summary: String,
    description: Option<String>,
    start: EventTime,
    end: EventTime,
    provenance: Provenance,
}

impl Event {
    /// Create a ready-to-submit event. Start and end must share granularity.
    pub fn new(
        summary: impl Into<String>,
        start: EventTime,
        end: EventTime,
        description: Option<String>,
    ) -> Result<Self> {
        Self::with_provenance(summary.into(), start, end, description, Provenance::Ready)
    }

    fn with_provenance(
        summary: String,
        start: EventTime,
        end: EventTime,
        description: Option<String>,
        provenance: Provenance,
    ) -> Result<Self> {
        if start.is_date_time() != end.is_date_time() {
            return Err(Error::InvalidGranularity);
        }
        Ok(Self { summary, description, start, end, provenance })
    }

    /// Rebuild an event the remote calendar already holds.
    ///
    /// With a history store the event is labelled with the stage that created
    /// it; without one, or when the `(calendar, id)` pair is unknown, it is
    /// labelled foreign.
    pub fn from_remote(
        remote: &RemoteEvent,
        calendar_id: &str,
        history: Option<&HistoryStore>,
    ) -> Result<Self> {
        let pair = IdPair::new(calendar_id, remote.id.as_str());
        let provenance = history
            .and_then(|h| h.exists(&pair))
            .map_or(Provenance::Foreign, Provenance::Stage);
        Self::with_provenance(
            remote.summary.clone().unwrap_or_else(|| "(No title)".to_string()),
            remote.start.into(),
            remote.end.into(),
            remote.description.clone(),
            provenance,
        )
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn start(&self) -> EventTime {
        self.start
    }

    pub fn end(&self) -> EventTime {
        self.end
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn is_date_time(&self) -> bool {
        self.start.is_date_time()
    }

    pub fn remote_start(&self) -> TimePayload {
        self.start.to_payload()
    }

    pub fn remote_end(&self) -> TimePayload {
        self.end.to_payload()
    }

    /// Body sent to the remote calendar when this event is submitted
    pub fn submission_body(&self) -> EventBody {
        EventBody {
            summary: self.summary.clone(),
            description: self.description.clone(),
            start: self.remote_start(),
            end: self.remote_end(),
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<32} {:<10} {:<24} {}", self.summary, self.provenance, self.start, self.end)
    }
}
