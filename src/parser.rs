//! Bulk event text parser
//!
//! Each line describes one event:
//!
//! ```text
//! <summary> | <start-date> [<start-time>] [<end-date>] [<end-time>]
//! ```
//!
//! Dates are `YYYY-MM-DD`, times are 12-hour with an `AM`/`PM` suffix and no
//! space before it (`02:30PM`). Lines that do not fit the grammar are skipped;
//! lines that fit but hold impossible values fail the whole batch.

use crate::error::{Error, Result};
use crate::event::{Event, EventTime};
use chrono::{Duration, NaiveDate, NaiveTime};
use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::fmt;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%I:%M%p";

static LINE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*([\w\s,\-.;'!\[\]()]+?)\s+\|\s+(\d{4}-\d{2}-\d{2})\s*(\d{1,2}:\d{2}(?:AM|PM))?\s*(\d{4}-\d{2}-\d{2})?\s*(\d{1,2}:\d{2}(?:AM|PM))?",
    )
    .expect("line pattern is valid")
});

/// Result of parsing one block of text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseOutcome {
    /// Lines that matched the grammar, whether or not they produced an event
    pub recognized: usize,
    /// Parsed events in input order; empty when `data_error` is set
    pub events: Vec<Event>,
    /// First semantic failure among the recognized lines
    pub data_error: Option<String>,
}

impl ParseOutcome {
    pub fn has_data_error(&self) -> bool {
        self.data_error.is_some()
    }

    /// Count line shown to the user, e.g. `2 groups found. Data error.`
    pub fn label(&self) -> String {
        let plural = if self.recognized == 1 { "" } else { "s" };
        let suffix = if self.has_data_error() { " Data error." } else { "" };
        format!("{} group{} found.{}", self.recognized, plural, suffix)
    }
}

impl fmt::Display for ParseOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Fields captured from a line, before any date/time interpretation
#[derive(Debug)]
struct RawFields<'a> {
    line: &'a str,
    summary: &'a str,
    start_date: &'a str,
    start_time: Option<&'a str>,
    end_date: Option<&'a str>,
    end_time: Option<&'a str>,
}

impl<'a> RawFields<'a> {
    fn capture(line: &'a str) -> Option<Self> {
        let caps: Captures<'a> = LINE_PATTERN.captures(line)?;
        let summary = caps.get(1)?.as_str().trim();
        if summary.is_empty() {
            return None;
        }
        Some(Self {
            line,
            summary,
            start_date: caps.get(2)?.as_str(),
            start_time: caps.get(3).map(|m| m.as_str()),
            end_date: caps.get(4).map(|m| m.as_str()),
            end_time: caps.get(5).map(|m| m.as_str()),
        })
    }

    fn data_error(&self, reason: impl Into<String>) -> Error {
        Error::ParseData { line: self.line.trim().to_string(), reason: reason.into() }
    }

    fn date(&self, value: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(value, DATE_FORMAT)
            .map_err(|e| self.data_error(format!("bad date {}: {}", value, e)))
    }

    fn time(&self, value: Option<&str>) -> Result<Option<NaiveTime>> {
        value
            .map(|v| {
                NaiveTime::parse_from_str(v, TIME_FORMAT)
                    .map_err(|e| self.data_error(format!("bad time {}: {}", v, e)))
            })
            .transpose()
    }

    fn local(&self, date: NaiveDate, time: Option<NaiveTime>) -> Result<EventTime> {
        let naive = date.and_time(time.unwrap_or(NaiveTime::MIN));
        EventTime::from_local(naive)
            .ok_or_else(|| self.data_error(format!("{} does not exist in the local timezone", naive)))
    }

    fn into_event(self) -> Result<Event> {
        let start_date = self.date(self.start_date)?;
        let start_time = self.time(self.start_time)?;
        let end_date = self.end_date.map(|d| self.date(d)).transpose()?;
        let end_time = self.time(self.end_time)?;

        let (start, end) = match (end_date, start_time) {
            // Same-moment event; a trailing time without an end date is ignored
            (None, Some(time)) => {
                let start = self.local(start_date, Some(time))?;
                (start, start)
            }
            // Whole day: ends 24 hours after it starts
            (None, None) => {
                let end = start_date
                    .checked_add_signed(Duration::days(1))
                    .ok_or_else(|| self.data_error("end date out of range"))?;
                (EventTime::Date(start_date), EventTime::Date(end))
            }
            (Some(end_date), None) if end_time.is_none() => {
                (EventTime::Date(start_date), EventTime::Date(end_date))
            }
            // Any clock time makes both sides date-times, missing ones at midnight
            (Some(end_date), start_time) => {
                (self.local(start_date, start_time)?, self.local(end_date, end_time)?)
            }
        };

        Event::new(self.summary, start, end, None)
    }
}

/// Parse a block of text into events.
///
/// Stateless; safe to call on every edit.
pub fn parse(text: &str) -> ParseOutcome {
    let mut outcome = ParseOutcome::default();

    for fields in text.lines().filter_map(RawFields::capture) {
        outcome.recognized += 1;
        if outcome.data_error.is_some() {
            continue;
        }
        match fields.into_event() {
            Ok(event) => {
                debug!(
                    "Parsed: Event {:?} starts {} and ends {}",
                    event.summary(),
                    event.start(),
                    event.end()
                );
                outcome.events.push(event);
            }
            Err(e) => {
                warn!("Input has data errors (invalid dates etc.): {}", e);
                outcome.data_error = Some(e.to_string());
            }
        }
    }

    if outcome.data_error.is_some() {
        outcome.events.clear();
    }
    outcome
}
