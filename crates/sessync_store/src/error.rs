//! Error types for the session store.

use sessync_engine::SyncError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the session store and its collaborators.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A ZIP archive could not be read or written.
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// No session with this id exists locally.
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// The sessions directory does not exist.
    #[error("sessions directory does not exist: {0}")]
    DirectoryMissing(PathBuf),

    /// Another process holds the sessions directory lock.
    #[error("sessions directory is locked: {0}")]
    Locked(PathBuf),

    /// An engine operation failed.
    #[error(transparent)]
    Engine(#[from] SyncError),
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Io(e) => SyncError::Io(e),
            StoreError::Engine(e) => e,
            StoreError::Zip(e) => SyncError::archive(e.to_string()),
            StoreError::Json(e) => SyncError::archive(e.to_string()),
            other => SyncError::archive(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_to_engine_errors() {
        let io = StoreError::Io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(matches!(SyncError::from(io), SyncError::Io(_)));

        let zip = StoreError::Zip(zip::result::ZipError::FileNotFound);
        assert!(matches!(SyncError::from(zip), SyncError::Archive(_)));

        let id = Uuid::new_v4();
        let engine = StoreError::Engine(SyncError::ArchiveMissing(id));
        assert!(matches!(
            SyncError::from(engine),
            SyncError::ArchiveMissing(found) if found == id
        ));
    }
}
