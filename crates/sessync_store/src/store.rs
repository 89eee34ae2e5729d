//! Filesystem-backed session store.

use crate::archive::{self, HISTORY_ENTRY};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::markers::MarkerSet;
use fs2::FileExt;
use parking_lot::RwLock;
use sessync_engine::{now_millis, EngineResult, KeyedExecutor, LocalSessionStore, SessionInfo};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

const LOCK_FILE: &str = "LOCK";
const STAGING_DIR: &str = "tmp";
const UNREADABLE_DIR: &str = "unreadable";
const ARCHIVE_SUFFIX: &str = ".zip";
const TOMBSTONE_SUFFIX: &str = ".tombstone";

/// Archives moved to the unreadable folder while a store was opening.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuarantineReport {
    /// Sessions whose archive had no usable manifest, in id order.
    pub sessions: Vec<Uuid>,
    /// Archives whose file name is not a session id, at their new path.
    pub unnamed: Vec<PathBuf>,
}

impl QuarantineReport {
    /// Returns true if nothing was quarantined.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty() && self.unnamed.is_empty()
    }

    /// Number of archives moved.
    pub fn len(&self) -> usize {
        self.sessions.len() + self.unnamed.len()
    }
}

/// Session store over a directory of ZIP archives.
///
/// The cache is loaded from every archive manifest when the store opens.
/// Archives that cannot be read are moved to `unreadable/`, so their bytes
/// survive and the remote copy of the session is not downloaded over them.
/// Application operations run on the shared session executor under the
/// session id, so they serialize with sync work on the same session. They
/// must not be called from inside a session executor task.
///
/// # Thread Safety
///
/// The store holds an exclusive lock on its directory; a second store on
/// the same directory fails to open with [`StoreError::Locked`].
pub struct FsSessionStore {
    root: PathBuf,
    cache: RwLock<HashMap<Uuid, SessionInfo>>,
    tombstones: MarkerSet,
    unreadable: MarkerSet,
    executor: Arc<KeyedExecutor<Uuid>>,
    quarantined: QuarantineReport,
    _lock_file: File,
}

impl FsSessionStore {
    /// Opens a store with its own session executor.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let executor = Arc::new(KeyedExecutor::new(&config.executor)?);
        Self::open_with_executor(config, executor)
    }

    /// Opens a store that shares an existing session executor.
    pub fn open_with_executor(
        config: &StoreConfig,
        executor: Arc<KeyedExecutor<Uuid>>,
    ) -> StoreResult<Self> {
        let root = config.sessions_dir.clone();
        if !root.is_dir() {
            if config.create_if_missing {
                fs::create_dir_all(&root)?;
            } else {
                return Err(StoreError::DirectoryMissing(root));
            }
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(root.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(root));
        }

        let mut store = Self {
            tombstones: MarkerSet::new(&root, TOMBSTONE_SUFFIX),
            unreadable: MarkerSet::new(root.join(UNREADABLE_DIR), ARCHIVE_SUFFIX),
            cache: RwLock::new(HashMap::new()),
            executor,
            quarantined: QuarantineReport::default(),
            root,
            _lock_file: lock_file,
        };
        store.clear_staging()?;
        store.quarantined = store.load_cache()?;
        Ok(store)
    }

    /// Sessions directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Shared handle to the session executor.
    pub fn executor(&self) -> Arc<KeyedExecutor<Uuid>> {
        Arc::clone(&self.executor)
    }

    /// Archives moved to `unreadable/` when the store opened.
    pub fn quarantined_at_open(&self) -> &QuarantineReport {
        &self.quarantined
    }

    fn load_cache(&self) -> StoreResult<QuarantineReport> {
        let mut loaded = HashMap::new();
        let mut report = QuarantineReport::default();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            let Some(stem) = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_suffix(ARCHIVE_SUFFIX))
            else {
                continue;
            };

            // Only the canonical form maps back to `archive_path`.
            let Some(id) = Uuid::parse_str(stem).ok().filter(|id| id.to_string() == stem) else {
                warn!(path = %path.display(), "archive name is not a session id, quarantining");
                report.unnamed.push(self.unreadable.adopt(&path)?);
                continue;
            };

            match archive::read_info(&path) {
                Ok(Some(info)) if info.id == id => {
                    loaded.insert(id, info);
                    continue;
                }
                Ok(Some(info)) => warn!(
                    path = %path.display(),
                    manifest_id = %info.id,
                    "manifest id does not match archive name, quarantining"
                ),
                Ok(None) => warn!(path = %path.display(), "archive has no manifest, quarantining"),
                Err(e) => warn!(
                    path = %path.display(),
                    error = %e,
                    "unreadable session archive, quarantining"
                ),
            }
            self.move_to_unreadable(id)?;
            report.sessions.push(id);
        }

        report.sessions.sort();
        report.unnamed.sort();
        if !report.is_empty() {
            warn!(
                archives = report.len(),
                dir = %self.unreadable.dir().display(),
                "quarantined unreadable session archives"
            );
        }
        debug!(sessions = loaded.len(), root = %self.root.display(), "loaded session cache");
        *self.cache.write() = loaded;
        Ok(report)
    }

    /// Moves a session's archive to the unreadable folder, replacing any
    /// earlier copy there. Returns false if the session has no archive.
    fn move_to_unreadable(&self, session_id: Uuid) -> StoreResult<bool> {
        let path = self.archive_path(session_id);
        if !path.exists() {
            return Ok(false);
        }
        self.unreadable.mark_by_move(session_id, &path)?;
        Ok(true)
    }

    /// Staging files only live for one merge; any left over are from a crash.
    fn clear_staging(&self) -> StoreResult<()> {
        let dir = self.staging_dir();
        match fs::remove_dir_all(&dir) {
            Ok(()) => debug!(dir = %dir.display(), "removed stale staging files"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Returns the cached metadata of a session.
    pub fn get(&self, session_id: Uuid) -> Option<SessionInfo> {
        self.cache.read().get(&session_id).cloned()
    }

    /// Lists sessions, most recently modified first.
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<_> = self.cache.read().values().cloned().collect();
        sessions.sort_by(|a, b| b.modified.cmp(&a.modified).then(a.id.cmp(&b.id)));
        sessions
    }

    /// Creates an empty session.
    pub fn create_session(self: &Arc<Self>, name: &str) -> StoreResult<SessionInfo> {
        let now = now_millis();
        let info = SessionInfo::new(Uuid::new_v4(), name, now, now);
        let id = info.id;

        let store = Arc::clone(self);
        let created = info.clone();
        self.executor.run(id, move || -> StoreResult<()> {
            let manifest = serde_json::to_vec_pretty(&created)?;
            let bytes = archive::build_archive(&[
                (archive::MANIFEST_ENTRY, manifest.as_slice()),
                (HISTORY_ENTRY, b"[]".as_slice()),
            ])?;
            archive::write_atomic(&store.archive_path(id), &bytes)?;
            store.cache.write().insert(id, created);
            Ok(())
        })??;

        info!(session = %id, name, "created session");
        Ok(info)
    }

    /// Renames a session.
    pub fn rename_session(
        self: &Arc<Self>,
        session_id: Uuid,
        name: &str,
    ) -> StoreResult<SessionInfo> {
        let name = name.to_owned();
        self.edit_session(session_id, move |info, _| {
            info.name = name;
            Ok(())
        })
    }

    /// Runs `edit` on a session's archive and manifest on the session queue,
    /// then stores the manifest with `modified` bumped.
    ///
    /// `edit` receives the manifest to adjust and the archive path.
    pub fn edit_session<F>(self: &Arc<Self>, session_id: Uuid, edit: F) -> StoreResult<SessionInfo>
    where
        F: FnOnce(&mut SessionInfo, &Path) -> StoreResult<()> + Send + 'static,
    {
        let store = Arc::clone(self);
        self.executor.run(session_id, move || -> StoreResult<SessionInfo> {
            let mut info = store
                .get(session_id)
                .ok_or(StoreError::SessionNotFound(session_id))?;
            let path = store.archive_path(session_id);
            edit(&mut info, &path)?;

            // Strictly increasing even within one millisecond.
            info.modified = now_millis().max(info.modified + 1);
            archive::write_info(&path, &info)?;
            store.cache.write().insert(session_id, info.clone());
            Ok(info)
        })?
    }

    /// Deletes a session locally and leaves a tombstone for the next sync.
    pub fn delete_session(self: &Arc<Self>, session_id: Uuid) -> StoreResult<()> {
        let store = Arc::clone(self);
        self.executor.run(session_id, move || -> StoreResult<()> {
            let removed = store.cache.write().remove(&session_id);
            let path = store.archive_path(session_id);
            if path.exists() {
                store.tombstones.mark_by_move(session_id, &path)?;
            } else if removed.is_some() {
                store.tombstones.mark(session_id, b"")?;
            } else {
                return Err(StoreError::SessionNotFound(session_id));
            }
            Ok(())
        })??;

        info!(session = %session_id, "deleted session");
        Ok(())
    }

    /// Moves a session archive into the unreadable folder and drops it from
    /// the cache. Returns false if the session has no archive.
    pub fn quarantine(self: &Arc<Self>, session_id: Uuid) -> StoreResult<bool> {
        let store = Arc::clone(self);
        let moved = self.executor.run(session_id, move || -> StoreResult<bool> {
            store.cache.write().remove(&session_id);
            store.move_to_unreadable(session_id)
        })??;

        if moved {
            warn!(session = %session_id, "quarantined session archive");
        }
        Ok(moved)
    }
}

impl std::fmt::Debug for FsSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FsSessionStore")
            .field("root", &self.root)
            .field("sessions", &self.cache.read().len())
            .finish()
    }
}

impl LocalSessionStore for FsSessionStore {
    fn session_executor(&self) -> &KeyedExecutor<Uuid> {
        &self.executor
    }

    fn cached_sessions(&self) -> HashMap<Uuid, SessionInfo> {
        self.cache.read().clone()
    }

    fn cached(&self, session_id: Uuid) -> Option<SessionInfo> {
        self.get(session_id)
    }

    fn put_cached(&self, info: SessionInfo) {
        self.cache.write().insert(info.id, info);
    }

    fn remove_cached(&self, session_id: Uuid) -> Option<SessionInfo> {
        self.cache.write().remove(&session_id)
    }

    fn archive_path(&self, session_id: Uuid) -> PathBuf {
        self.root.join(format!("{session_id}{ARCHIVE_SUFFIX}"))
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    fn read_archive(&self, session_id: Uuid) -> EngineResult<Option<Vec<u8>>> {
        match fs::read(self.archive_path(session_id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_archive(&self, session_id: Uuid, content: &[u8]) -> EngineResult<()> {
        archive::write_atomic(&self.archive_path(session_id), content)?;
        Ok(())
    }

    fn delete_archive(&self, session_id: Uuid) -> EngineResult<bool> {
        match fs::remove_file(self.archive_path(session_id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn read_info(&self, archive: &Path) -> EngineResult<Option<SessionInfo>> {
        Ok(archive::read_info(archive)?)
    }

    fn write_info(&self, archive: &Path, info: &SessionInfo) -> EngineResult<()> {
        archive::write_info(archive, info)?;
        Ok(())
    }

    fn tombstones(&self) -> EngineResult<HashSet<Uuid>> {
        Ok(self.tombstones.ids()?)
    }

    fn remove_tombstone(&self, session_id: Uuid) -> EngineResult<()> {
        if self.tombstones.remove(session_id)? {
            debug!(session = %session_id, "removed tombstone");
        }
        Ok(())
    }

    fn unreadable_sessions(&self) -> EngineResult<HashSet<Uuid>> {
        Ok(self.unreadable.ids()?)
    }

    fn mark_unreadable(&self, session_id: Uuid, content: &[u8]) -> EngineResult<()> {
        let path = self.unreadable.mark(session_id, content)?;
        warn!(session = %session_id, path = %path.display(), "stored unreadable remote session");
        Ok(())
    }
}
