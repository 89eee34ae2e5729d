//! Local session store abstraction.

use crate::error::EngineResult;
use crate::keyed::KeyedExecutor;
use crate::model::SessionInfo;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// The on-disk session store the engine reconciles with the remote.
///
/// Implementations keep an in-memory cache of session metadata mirrored from
/// the manifests of their session archives. The engine only mutates a
/// session's cache entry and archive from inside a task submitted to
/// [`session_executor`](Self::session_executor) for that session id, and the
/// application is expected to do the same.
pub trait LocalSessionStore: Send + Sync + 'static {
    /// The application-wide serial executor keyed by session id.
    fn session_executor(&self) -> &KeyedExecutor<Uuid>;

    /// Point-in-time copy of the session cache.
    fn cached_sessions(&self) -> HashMap<Uuid, SessionInfo>;

    /// Current cache entry for a session.
    fn cached(&self, session_id: Uuid) -> Option<SessionInfo>;

    /// Inserts or replaces a cache entry.
    fn put_cached(&self, info: SessionInfo);

    /// Removes a cache entry.
    fn remove_cached(&self, session_id: Uuid) -> Option<SessionInfo>;

    /// Path of a session's archive.
    fn archive_path(&self, session_id: Uuid) -> PathBuf;

    /// Directory for transient staging files.
    fn staging_dir(&self) -> PathBuf;

    /// Reads a session's archive bytes, `None` if it has no archive.
    fn read_archive(&self, session_id: Uuid) -> EngineResult<Option<Vec<u8>>>;

    /// Replaces a session's archive with `content`.
    fn write_archive(&self, session_id: Uuid, content: &[u8]) -> EngineResult<()>;

    /// Deletes a session's archive. Returns false if there was none.
    fn delete_archive(&self, session_id: Uuid) -> EngineResult<bool>;

    /// Reads the manifest embedded in an archive, `None` if it has none.
    fn read_info(&self, archive: &Path) -> EngineResult<Option<SessionInfo>>;

    /// Writes the manifest embedded in an archive, creating the archive if
    /// needed.
    fn write_info(&self, archive: &Path, info: &SessionInfo) -> EngineResult<()>;

    /// Sessions deleted locally whose deletion has not reached the remote.
    fn tombstones(&self) -> EngineResult<HashSet<Uuid>>;

    /// Clears the tombstone of a session.
    fn remove_tombstone(&self, session_id: Uuid) -> EngineResult<()>;

    /// Remote sessions previously found unreadable.
    fn unreadable_sessions(&self) -> EngineResult<HashSet<Uuid>>;

    /// Records remote content that could not be read.
    fn mark_unreadable(&self, session_id: Uuid, content: &[u8]) -> EngineResult<()>;
}
