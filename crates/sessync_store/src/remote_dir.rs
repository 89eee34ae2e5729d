//! A directory acting as the remote session service.
//!
//! ```text
//! <remote>/
//! ├─ index.json        # every RemoteSessionMeta, active and soft-deleted
//! ├─ index.lock        # advisory lock held while the index is rewritten
//! └─ blobs/<id>.zip    # session archives
//! ```
//!
//! Several processes may share the directory; index updates take an
//! exclusive advisory lock and readers a shared one.

use crate::archive::write_atomic;
use crate::error::{StoreError, StoreResult};
use fs2::FileExt;
use parking_lot::Mutex;
use sessync_engine::{now_millis, EngineResult, RemoteSessionMeta, RemoteSessionService, SyncError};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

const INDEX_FILE: &str = "index.json";
const INDEX_LOCK: &str = "index.lock";
const BLOB_DIR: &str = "blobs";

type Index = BTreeMap<Uuid, RemoteSessionMeta>;

/// Remote session service stored in a local or shared directory.
#[derive(Debug)]
pub struct DirectoryRemote {
    root: PathBuf,
    // Serializes writers within this process; the file lock covers others.
    write_guard: Mutex<()>,
}

impl DirectoryRemote {
    /// Opens a remote directory, creating it if needed.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(BLOB_DIR))?;
        Ok(Self {
            root,
            write_guard: Mutex::new(()),
        })
    }

    /// Remote directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, session_id: Uuid) -> PathBuf {
        self.root.join(BLOB_DIR).join(format!("{session_id}.zip"))
    }

    fn lock_file(&self) -> StoreResult<File> {
        Ok(OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.root.join(INDEX_LOCK))?)
    }

    fn read_index(&self) -> StoreResult<Index> {
        let data = match fs::read(self.root.join(INDEX_FILE)) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Index::new()),
            Err(e) => return Err(e.into()),
        };
        let sessions: Vec<RemoteSessionMeta> = serde_json::from_slice(&data)?;
        Ok(sessions.into_iter().map(|meta| (meta.id, meta)).collect())
    }

    /// Reads the index under a shared lock.
    pub fn index(&self) -> StoreResult<Vec<RemoteSessionMeta>> {
        let lock = self.lock_file()?;
        lock.lock_shared()?;
        let index = self.read_index();
        lock.unlock()?;
        Ok(index?.into_values().collect())
    }

    /// Applies `update` to the index under an exclusive lock and writes it
    /// back.
    fn update_index<T>(&self, update: impl FnOnce(&mut Index) -> StoreResult<T>) -> StoreResult<T> {
        let _guard = self.write_guard.lock();
        let lock = self.lock_file()?;
        lock.lock_exclusive()?;

        let result = self.read_index().and_then(|mut index| {
            let value = update(&mut index)?;
            let sessions: Vec<_> = index.into_values().collect();
            write_atomic(&self.root.join(INDEX_FILE), &serde_json::to_vec_pretty(&sessions)?)?;
            Ok(value)
        });
        lock.unlock()?;
        result
    }
}

fn remote_error(err: StoreError) -> SyncError {
    match err {
        StoreError::Io(e) => SyncError::remote_retryable(e.to_string()),
        StoreError::Engine(e) => e,
        other => SyncError::remote_fatal(other.to_string()),
    }
}

impl RemoteSessionService for DirectoryRemote {
    fn list_sessions(&self, remote_project: &str) -> EngineResult<Vec<RemoteSessionMeta>> {
        let sessions = self.index().map_err(remote_error)?;
        Ok(sessions
            .into_iter()
            .filter(|meta| meta.remote_project == remote_project)
            .collect())
    }

    fn get_content(&self, session_id: Uuid) -> EngineResult<Vec<u8>> {
        match fs::read(self.blob_path(session_id)) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(SyncError::RemoteNotFound(session_id))
            }
            Err(e) => Err(SyncError::remote_retryable(e.to_string())),
        }
    }

    fn write_session(
        &self,
        session_id: Uuid,
        remote_project: &str,
        name: &str,
        modified_at_millis: i64,
        content: &[u8],
    ) -> EngineResult<()> {
        self.update_index(|index| {
            write_atomic(&self.blob_path(session_id), content)?;
            index.insert(
                session_id,
                RemoteSessionMeta::new(session_id, name, remote_project, modified_at_millis),
            );
            Ok(())
        })
        .map_err(remote_error)?;
        debug!(session = %session_id, bytes = content.len(), "stored remote session");
        Ok(())
    }

    fn delete_session(&self, session_id: Uuid) -> EngineResult<()> {
        self.update_index(|index| {
            let meta = index
                .get_mut(&session_id)
                .ok_or(SyncError::RemoteNotFound(session_id))?;
            if meta.deleted_at_millis.is_none() {
                meta.deleted_at_millis = Some(now_millis());
            }
            Ok(())
        })
        .map_err(remote_error)?;
        debug!(session = %session_id, "soft-deleted remote session");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn write_list_and_fetch() {
        let dir = tempdir().unwrap();
        let remote = DirectoryRemote::open(dir.path()).unwrap();
        let id = Uuid::new_v4();

        remote.write_session(id, "proj", "Session", 42, b"zip").unwrap();

        let listed = remote.list_sessions("proj").unwrap();
        assert_eq!(listed, vec![RemoteSessionMeta::new(id, "Session", "proj", 42)]);
        assert!(remote.list_sessions("other").unwrap().is_empty());
        assert_eq!(remote.get_content(id).unwrap(), b"zip");
    }

    #[test]
    fn delete_is_soft_and_rewrite_resurrects() {
        let dir = tempdir().unwrap();
        let remote = DirectoryRemote::open(dir.path()).unwrap();
        let id = Uuid::new_v4();
        remote.write_session(id, "proj", "S", 1, b"v1").unwrap();

        remote.delete_session(id).unwrap();
        let meta = &remote.list_sessions("proj").unwrap()[0];
        assert!(meta.is_deleted());
        assert_eq!(remote.get_content(id).unwrap(), b"v1");

        remote.write_session(id, "proj", "S", 2, b"v2").unwrap();
        assert!(!remote.list_sessions("proj").unwrap()[0].is_deleted());
    }

    #[test]
    fn unknown_sessions_are_not_found() {
        let dir = tempdir().unwrap();
        let remote = DirectoryRemote::open(dir.path()).unwrap();
        let id = Uuid::new_v4();

        assert!(matches!(remote.get_content(id), Err(SyncError::RemoteNotFound(_))));
        assert!(matches!(remote.delete_session(id), Err(SyncError::RemoteNotFound(_))));
    }

    #[test]
    fn index_survives_reopen() {
        let dir = tempdir().unwrap();
        let id = Uuid::new_v4();
        DirectoryRemote::open(dir.path())
            .unwrap()
            .write_session(id, "proj", "S", 7, b"x")
            .unwrap();

        let remote = DirectoryRemote::open(dir.path()).unwrap();
        assert_eq!(remote.list_sessions("proj").unwrap()[0].modified_at_millis, 7);
    }
}
