//! Error types for the sync engine.

use std::io;
use thiserror::Error;
use uuid::Uuid;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, SyncError>;

/// Errors that can occur during session synchronization.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Remote session service failure (network, HTTP status, decoding).
    #[error("remote error: {message}")]
    Remote {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Local file system error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A session archive could not be read or written.
    #[error("archive error: {0}")]
    Archive(String),

    /// A history snapshot could not be decoded or encoded.
    #[error("history error: {0}")]
    History(String),

    /// The remote service has no content for this session.
    #[error("remote session not found: {0}")]
    RemoteNotFound(Uuid),

    /// The local archive for a session is missing.
    #[error("local archive missing for session {0}")]
    ArchiveMissing(Uuid),

    /// Remote content carried no readable manifest.
    #[error("unreadable remote session {0}")]
    UnreadableRemote(Uuid),

    /// An action was missing the metadata its type requires.
    #[error("invalid {action} action for session {session_id}: {reason}")]
    InvalidAction {
        /// Action type name.
        action: String,
        /// Session the action targeted.
        session_id: Uuid,
        /// What was missing.
        reason: String,
    },

    /// A task submitted to the session executor never produced a result.
    #[error("session task aborted for key {0}")]
    TaskAborted(String),
}

impl SyncError {
    /// Creates a retryable remote error.
    pub fn remote_retryable(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable remote error.
    pub fn remote_fatal(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates an archive error.
    pub fn archive(message: impl Into<String>) -> Self {
        Self::Archive(message.into())
    }

    /// Creates a history error.
    pub fn history(message: impl Into<String>) -> Self {
        Self::History(message.into())
    }

    /// Returns true if this error can be retried on a later pass.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote { retryable, .. } => *retryable,
            SyncError::Io(_) => true,
            SyncError::TaskAborted(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_errors() {
        assert!(SyncError::remote_retryable("connection reset").is_retryable());
        assert!(!SyncError::remote_fatal("forbidden").is_retryable());
        assert!(SyncError::Io(io::Error::new(io::ErrorKind::Other, "disk")).is_retryable());
        assert!(!SyncError::UnreadableRemote(Uuid::nil()).is_retryable());
    }

    #[test]
    fn error_display() {
        let id = Uuid::nil();
        let err = SyncError::InvalidAction {
            action: "DOWNLOAD".into(),
            session_id: id,
            reason: "no remote metadata".into(),
        };
        let text = err.to_string();
        assert!(text.contains("DOWNLOAD"));
        assert!(text.contains(&id.to_string()));

        assert_eq!(
            SyncError::archive("bad manifest").to_string(),
            "archive error: bad manifest"
        );
    }
}
