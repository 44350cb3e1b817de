use thiserror::Error;

use crate::services::parser::{ParseError, ReadError};
use crate::services::xtream::XtreamError;
use crate::store::StoreError;

/// Everything that can end a sync run. The engine turns these into
/// `Process::Failure(message)` through `Display`.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("upstream returned HTTP {0}")]
    Http(u16),

    #[error("playlist too large: {size_mb:.1}MB (limit {limit_mb}MB)")]
    TooLarge { size_mb: f64, limit_mb: u64 },

    #[error("sync cancelled")]
    Cancelled,

    #[error("not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("xtream: {0}")]
    Xtream(XtreamError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SyncError::Timeout(e.to_string())
        } else {
            SyncError::Transport(e.to_string())
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SyncError::Cancelled)
    }
}

impl From<ReadError> for SyncError {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::Parse(e) => SyncError::Parse(e),
            ReadError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                SyncError::Timeout(e.to_string())
            }
            ReadError::Io(e) => SyncError::Io(e),
            ReadError::Timeout(after) => SyncError::Timeout(format!("no data received for {:?}", after)),
        }
    }
}

impl From<XtreamError> for SyncError {
    fn from(e: XtreamError) -> Self {
        match e {
            XtreamError::Timeout => SyncError::Timeout("xtream request timed out".to_string()),
            XtreamError::Connect(msg) => SyncError::Transport(msg),
            XtreamError::Http(status) => SyncError::Http(status),
            other => SyncError::Xtream(other),
        }
    }
}
