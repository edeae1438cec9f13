//! Error types for the workflow engine
//!
//! ```text
//! WorkflowError
//! ├── InvalidInput           - empty text, language, session key or correction
//! ├── UpstreamTranslation    - translation service failed (run aborted at `translate`)
//! ├── UpstreamQc             - QC service failed (run aborted at `qc`)
//! ├── ParseRecoveryExhausted - repair chain found no object (never escapes the parser)
//! ├── NoSuchSession          - resume on an unknown or finished session
//! ├── NotSuspended           - resume on a session that is not parked for review
//! ├── SessionConflict        - session already in flight, or parked and restarted
//! ├── Persistence            - correction store / audit log I/O
//! ├── Checkpoint             - checkpoint saver failure
//! ├── Serialization          - checkpoint payload could not be (de)serialized
//! └── Internal               - background task failure
//! ```
//!
//! Resume-time misuse (`NoSuchSession`, `NotSuspended`, `SessionConflict`)
//! leaves the stored run untouched. Upstream failures leave the checkpoint at
//! the node that failed; the caller may retry the whole start.

use crate::adapters::AdapterError;
use crate::graph::Node;
use thiserror::Error;
use verba_checkpoint::CheckpointError;

/// Result type for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors raised by the workflow engine
#[derive(Error, Debug)]
pub enum WorkflowError {
    /// Caller supplied unusable input
    ///
    /// Never retried.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The translation adapter failed
    #[error("Translation step failed: {0}")]
    UpstreamTranslation(#[source] AdapterError),

    /// The quality-check adapter failed
    #[error("Quality check step failed: {0}")]
    UpstreamQc(#[source] AdapterError),

    /// No strategy in the repair chain produced an object
    ///
    /// Only raised inside the repair parser, which always turns it into the
    /// default QC result.
    #[error("Could not recover a score object from generator output ({preview:?})")]
    ParseRecoveryExhausted {
        /// First characters of the raw text, for logs
        preview: String,
    },

    /// No resumable run exists under this session key
    #[error("No such session: {0}")]
    NoSuchSession(String),

    /// The run exists but is not parked at human review
    #[error("Session '{session_key}' is not suspended (next node: {next})")]
    NotSuspended {
        /// Session that was addressed
        session_key: String,
        /// Node the run would execute next
        next: Node,
    },

    /// Another caller owns the session, or it is parked awaiting review
    #[error("Session conflict for '{session_key}': {reason}")]
    SessionConflict {
        /// Session that was addressed
        session_key: String,
        /// Why the claim was refused
        reason: String,
    },

    /// Correction store or audit log could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Checkpoint saver failure
    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Checkpoint payload could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A background run task panicked or was cancelled
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a session conflict error
    pub fn session_conflict(session_key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SessionConflict {
            session_key: session_key.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the whole start/resume may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UpstreamTranslation(_) | Self::UpstreamQc(_) => true,
            Self::Checkpoint(CheckpointError::Io(_)) => true,
            _ => false,
        }
    }
}

impl From<std::io::Error> for WorkflowError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_errors_are_retryable() {
        let err = WorkflowError::UpstreamTranslation(AdapterError::Transport("connection refused".into()));
        assert!(err.is_retryable());
        assert!(err.to_string().contains("connection refused"));

        assert!(!WorkflowError::invalid_input("empty source_text").is_retryable());
        assert!(!WorkflowError::NoSuchSession("s".into()).is_retryable());
    }

    #[test]
    fn test_not_suspended_display() {
        let err = WorkflowError::NotSuspended {
            session_key: "s-1".to_string(),
            next: Node::Qc,
        };
        assert_eq!(err.to_string(), "Session 's-1' is not suspended (next node: qc)");
    }

    #[test]
    fn test_checkpoint_error_converts() {
        let err: WorkflowError = CheckpointError::Invalid("thread_id is required".into()).into();
        assert!(matches!(err, WorkflowError::Checkpoint(_)));
    }
}
