//! Application error types.
//!
//! Provides unified error handling with actionable context for debugging.

use thiserror::Error;

use crate::types::{CheckpointId, ElementId};

/// Application result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Application error types with specific context for actionable debugging
#[derive(Debug, Error)]
pub enum Error {
    /// An operation referenced an element that is not in the script
    #[error("Element not found: {0}")]
    ElementNotFound(ElementId),

    /// An operation payload cannot be folded onto the current script
    #[error("Invalid operation {operation}: {reason}")]
    InvalidOperation {
        /// Description of the rejected operation.
        operation: String,
        /// Why the operation does not apply.
        reason: String,
    },

    /// No checkpoint with this id exists in the queue
    #[error("Checkpoint not found: {0}")]
    CheckpointNotFound(CheckpointId),

    /// Restoring a checkpoint produced a different element count than recorded
    #[error("Checkpoint {checkpoint} is stale: expected {expected} elements, found {actual}")]
    CheckpointMismatch {
        /// The checkpoint being restored.
        checkpoint: CheckpointId,
        /// Element count recorded when the checkpoint was created.
        expected: usize,
        /// Element count produced by the restore.
        actual: usize,
    },

    /// A save is already running for this queue
    #[error("A save is already in progress")]
    SaveInProgress,

    /// The persistence service rejected a request
    #[error("Save failed: {message}")]
    Save {
        /// Human-readable error description.
        message: String,
        /// HTTP status code, if from an HTTP response.
        status: Option<u16>,
        /// Actionable suggestion for resolving the error.
        hint: Option<&'static str>,
    },

    /// Network error (connection, timeout, DNS)
    #[error("Network error: {0}")]
    Network(String),

    /// Configuration error with guidance
    #[error("Configuration error: {message}. {hint}")]
    Config {
        /// Description of the configuration problem.
        message: String,
        /// Actionable guidance for fixing the issue.
        hint: &'static str,
    },

    /// File or response parsing error
    #[error("Parse error in {file:?}: {message}")]
    Parse {
        /// File that failed to parse, if known.
        file: Option<std::path::PathBuf>,
        /// Description of the parse failure.
        message: String,
    },

    /// IO error with path context
    #[error("IO error at {path:?}: {source}")]
    Io {
        /// The underlying IO error.
        source: std::io::Error,
        /// File path where the error occurred, if known.
        path: Option<std::path::PathBuf>,
    },

    /// JSON encoding or decoding failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create an IO error with path context
    pub fn io(source: std::io::Error, path: impl Into<Option<std::path::PathBuf>>) -> Self {
        Self::Io { source, path: path.into() }
    }

    /// Create an invalid-operation error
    pub fn invalid(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a save error without HTTP context
    pub fn save(message: impl Into<String>) -> Self {
        Self::Save {
            message: message.into(),
            status: None,
            hint: None,
        }
    }

    /// Create a save error with HTTP status
    pub fn save_status(message: impl Into<String>, status: u16) -> Self {
        let hint = match status {
            401 => Some("Check the SHOWFLOW_API_TOKEN environment variable"),
            403 => Some("Your account may not have edit access to this script"),
            404 => Some("The script was not found - it may have been deleted"),
            409 => Some("The script changed on the server - revert to server data and reapply"),
            422 => Some("The server rejected the edit batch as invalid"),
            429 => Some("Rate limited - wait a moment and try again"),
            500..=599 => Some("Server error - your edits are kept locally, try again later"),
            _ => None,
        };
        Self::Save {
            message: message.into(),
            status: Some(status),
            hint,
        }
    }

    /// Create a config error with actionable hint
    pub fn config(message: impl Into<String>, hint: &'static str) -> Self {
        Self::Config { message: message.into(), hint }
    }

    /// Create a parse error with file context
    pub fn parse(message: impl Into<String>, file: impl Into<Option<std::path::PathBuf>>) -> Self {
        Self::Parse { file: file.into(), message: message.into() }
    }

    /// Whether the failure is transient and the same batch may be retried later.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::SaveInProgress => true,
            Self::Save { status: Some(status), .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io { source: e, path: None }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn save_status_provides_hints() {
        let err = Error::save_status("Unauthorized", 401);
        match err {
            Error::Save { hint: Some(h), .. } => {
                assert!(h.contains("SHOWFLOW_API_TOKEN"));
            }
            _ => panic!("Expected Save error with hint"),
        }
    }

    #[test]
    fn server_errors_are_retryable() {
        assert!(Error::save_status("Bad gateway", 502).is_retryable());
        assert!(Error::Network("timeout".into()).is_retryable());
        assert!(!Error::save_status("Invalid batch", 422).is_retryable());
        assert!(!Error::ElementNotFound(ElementId::new("x")).is_retryable());
    }
}
