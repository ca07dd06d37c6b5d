//! Remote calendar collaborator: the narrow interface the core consumes and
//! the wire types exchanged with it.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

mod google;

pub use google::{GoogleCalendar, DEFAULT_API_BASE};

/// Custom error type for remote calendar operations
#[derive(Debug, thiserror::Error)]
pub enum CalendarError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("calendar service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response from calendar service: {0}")]
    Decode(String),
    #[error("invalid calendar API URL: {0}")]
    InvalidUrl(String),
}

/// One side of an event's time range as the remote API carries it.
///
/// Google sends either `{"date": "2024-01-10"}` or
/// `{"dateTime": "2024-01-10T09:00:00-05:00", "timeZone": ...}`; extra fields
/// are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimePayload {
    DateTime {
        #[serde(rename = "dateTime")]
        date_time: DateTime<FixedOffset>,
    },
    Date {
        date: NaiveDate,
    },
}

/// An event as listed or returned by the remote calendar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEvent {
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: TimePayload,
    pub end: TimePayload,
}

/// Request body for creating an event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventBody {
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start: TimePayload,
    pub end: TimePayload,
}

/// A calendar the user can write to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub id: String,
    pub summary: String,
    pub primary: bool,
}

/// Operations the core needs from a remote calendar.
///
/// Authentication is the implementor's concern; an implementor that cannot
/// obtain a working session must fail every call.
#[async_trait]
pub trait CalendarService: Send + Sync {
    async fn list_calendars(&self) -> Result<Vec<CalendarEntry>, CalendarError>;

    async fn list_events(
        &self,
        calendar_id: &str,
        from: DateTime<Utc>,
        max_results: u32,
        ordered_by_start: bool,
    ) -> Result<Vec<RemoteEvent>, CalendarError>;

    async fn insert_event(
        &self,
        calendar_id: &str,
        body: &EventBody,
    ) -> Result<RemoteEvent, CalendarError>;

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<(), CalendarError>;
}
