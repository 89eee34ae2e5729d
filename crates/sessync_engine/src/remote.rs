//! Remote session service abstraction.

use crate::error::{EngineResult, SyncError};
use crate::model::{now_millis, RemoteSessionMeta};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

/// A directory of sessions held by a remote service.
///
/// This trait abstracts the network layer so the engine can run against an
/// HTTP client, a shared folder or an in-memory fake.
pub trait RemoteSessionService: Send + Sync {
    /// Lists every session (active and soft-deleted) of a remote project.
    fn list_sessions(&self, remote_project: &str) -> EngineResult<Vec<RemoteSessionMeta>>;

    /// Fetches the archive bytes of a session.
    fn get_content(&self, session_id: Uuid) -> EngineResult<Vec<u8>>;

    /// Creates or replaces a session.
    fn write_session(
        &self,
        session_id: Uuid,
        remote_project: &str,
        name: &str,
        modified_at_millis: i64,
        content: &[u8],
    ) -> EngineResult<()>;

    /// Soft-deletes a session.
    fn delete_session(&self, session_id: Uuid) -> EngineResult<()>;
}

impl<T: RemoteSessionService + ?Sized> RemoteSessionService for std::sync::Arc<T> {
    fn list_sessions(&self, remote_project: &str) -> EngineResult<Vec<RemoteSessionMeta>> {
        (**self).list_sessions(remote_project)
    }

    fn get_content(&self, session_id: Uuid) -> EngineResult<Vec<u8>> {
        (**self).get_content(session_id)
    }

    fn write_session(
        &self,
        session_id: Uuid,
        remote_project: &str,
        name: &str,
        modified_at_millis: i64,
        content: &[u8],
    ) -> EngineResult<()> {
        (**self).write_session(session_id, remote_project, name, modified_at_millis, content)
    }

    fn delete_session(&self, session_id: Uuid) -> EngineResult<()> {
        (**self).delete_session(session_id)
    }
}

#[derive(Debug, Clone)]
struct StoredSession {
    meta: RemoteSessionMeta,
    content: Vec<u8>,
}

/// Calls observed by a [`MemoryRemote`], in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteCalls {
    /// Sessions whose content was fetched.
    pub downloaded: Vec<Uuid>,
    /// Sessions written.
    pub uploaded: Vec<Uuid>,
    /// Sessions soft-deleted.
    pub deleted: Vec<Uuid>,
}

/// An in-memory remote session service.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    sessions: RwLock<BTreeMap<Uuid, StoredSession>>,
    calls: RwLock<RemoteCalls>,
    offline: AtomicBool,
    failing_content: RwLock<HashSet<Uuid>>,
    failing_deletes: RwLock<HashSet<Uuid>>,
}

impl MemoryRemote {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a session without recording a call.
    pub fn insert(&self, meta: RemoteSessionMeta, content: Vec<u8>) {
        self.sessions
            .write()
            .insert(meta.id, StoredSession { meta, content });
    }

    /// Returns the metadata of a session.
    pub fn meta(&self, session_id: Uuid) -> Option<RemoteSessionMeta> {
        self.sessions.read().get(&session_id).map(|s| s.meta.clone())
    }

    /// Returns the stored content of a session.
    pub fn content(&self, session_id: Uuid) -> Option<Vec<u8>> {
        self.sessions
            .read()
            .get(&session_id)
            .map(|s| s.content.clone())
    }

    /// Returns the calls observed so far.
    pub fn calls(&self) -> RemoteCalls {
        self.calls.read().clone()
    }

    /// Makes every call fail with a retryable error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Makes content fetches for one session fail.
    pub fn fail_content_for(&self, session_id: Uuid) {
        self.failing_content.write().insert(session_id);
    }

    /// Makes deletes for one session fail.
    pub fn fail_delete_for(&self, session_id: Uuid) {
        self.failing_deletes.write().insert(session_id);
    }

    fn check_online(&self) -> EngineResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(SyncError::remote_retryable("remote service unreachable"))
        } else {
            Ok(())
        }
    }
}

impl RemoteSessionService for MemoryRemote {
    fn list_sessions(&self, remote_project: &str) -> EngineResult<Vec<RemoteSessionMeta>> {
        self.check_online()?;
        Ok(self
            .sessions
            .read()
            .values()
            .filter(|s| s.meta.remote_project == remote_project)
            .map(|s| s.meta.clone())
            .collect())
    }

    fn get_content(&self, session_id: Uuid) -> EngineResult<Vec<u8>> {
        self.check_online()?;
        if self.failing_content.read().contains(&session_id) {
            return Err(SyncError::remote_retryable(format!(
                "content fetch failed for {session_id}"
            )));
        }
        let content = self
            .sessions
            .read()
            .get(&session_id)
            .map(|s| s.content.clone())
            .ok_or(SyncError::RemoteNotFound(session_id))?;
        self.calls.write().downloaded.push(session_id);
        Ok(content)
    }

    fn write_session(
        &self,
        session_id: Uuid,
        remote_project: &str,
        name: &str,
        modified_at_millis: i64,
        content: &[u8],
    ) -> EngineResult<()> {
        self.check_online()?;
        let meta = RemoteSessionMeta::new(session_id, name, remote_project, modified_at_millis);
        self.insert(meta, content.to_vec());
        self.calls.write().uploaded.push(session_id);
        Ok(())
    }

    fn delete_session(&self, session_id: Uuid) -> EngineResult<()> {
        self.check_online()?;
        if self.failing_deletes.read().contains(&session_id) {
            return Err(SyncError::remote_retryable(format!(
                "delete failed for {session_id}"
            )));
        }
        let mut sessions = self.sessions.write();
        let stored = sessions
            .get_mut(&session_id)
            .ok_or(SyncError::RemoteNotFound(session_id))?;
        stored.meta.deleted_at_millis = Some(now_millis());
        drop(sessions);
        self.calls.write().deleted.push(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_list_by_project() {
        let remote = MemoryRemote::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        remote.write_session(a, "proj", "A", 10, b"a").unwrap();
        remote.write_session(b, "other", "B", 20, b"b").unwrap();

        let listed = remote.list_sessions("proj").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, a);
        assert_eq!(listed[0].modified_at_millis, 10);
        assert_eq!(remote.calls().uploaded, vec![a, b]);
    }

    #[test]
    fn delete_is_soft() {
        let remote = MemoryRemote::new();
        let id = Uuid::new_v4();
        remote.insert(RemoteSessionMeta::new(id, "n", "proj", 5), vec![1]);

        remote.delete_session(id).unwrap();

        let meta = remote.meta(id).unwrap();
        assert!(meta.is_deleted());
        assert_eq!(remote.list_sessions("proj").unwrap().len(), 1);
    }

    #[test]
    fn offline_remote_fails_retryably() {
        let remote = MemoryRemote::new();
        remote.set_offline(true);

        let err = remote.list_sessions("proj").unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn missing_content_is_not_found() {
        let remote = MemoryRemote::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            remote.get_content(id),
            Err(SyncError::RemoteNotFound(found)) if found == id
        ));
    }
}
