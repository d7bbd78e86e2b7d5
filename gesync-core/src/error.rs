//! Error types for gesync.

use thiserror::Error;

/// Errors that abort a sync run.
///
/// Per-item failures inside a batch are not errors; they are reported
/// through [`crate::batch::ItemOutcome`].
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Calendar not found: {0}")]
    CalendarNotFound(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid period: {0}")]
    Period(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Short name of the failure class, for user-facing messages.
    pub fn class(&self) -> &'static str {
        match self {
            SyncError::Authentication(_) => "bad credentials",
            SyncError::Protocol(_) | SyncError::Decode(_) => "unexpected portal response",
            SyncError::CalendarNotFound(_) => "unresolved calendar",
            SyncError::Transport(_) | SyncError::Io(_) => "transport",
            SyncError::Period(_) | SyncError::Config(_) => "configuration",
        }
    }
}

/// Result type alias for gesync operations.
pub type SyncResult<T> = Result<T, SyncError>;
