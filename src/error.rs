//! Error types shared by the event ingestion and undo core.

use crate::calendar::CalendarError;
use std::path::PathBuf;

/// Custom error type for parsing, history and submission operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("start and end must both be dates or both be date-times")]
    InvalidGranularity,
    #[error("invalid event data in line {line:?}: {reason}")]
    ParseData { line: String, reason: String },
    #[error("there is no submission stage to undo")]
    EmptyHistory,
    #[error("stage index {found} does not follow the newest stage (expected {expected})")]
    StageOutOfOrder { expected: u64, found: u64 },
    #[error("remote calendar operation failed: {0}")]
    RemoteOperationFailed(#[from] CalendarError),
    #[error("history storage error at {}: {source}", path.display())]
    StorageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("history file {} is corrupt: {reason}", path.display())]
    CorruptHistory { path: PathBuf, reason: String },
    #[error("no calendar has been selected")]
    NoActiveCalendar,
    #[error("no Google Calendar access token found (set BULK_REMINDERS_TOKEN or create {})", path.display())]
    MissingToken { path: PathBuf },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::StorageIo { path: path.into(), source }
    }
}
