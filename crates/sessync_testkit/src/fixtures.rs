//! Test fixtures: a temporary session store wired to an in-memory remote.

use sessync_engine::{
    ExecutorConfig, LocalSessionStore, MemoryRemote, OpenSessionRegistry, RemoteSessionMeta,
    SessionHandle, SessionInfo, SessionSynchronizer, SyncConfig, SyncExecutor,
};
use sessync_store::{archive, FsSessionStore, Journal, JournalEntry, JournalHistory, StoreConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// Remote project used by [`TestEnv`].
pub const ENV_PROJECT: &str = "test-project";

/// Synchronizer type wired by [`TestEnv`].
pub type TestSynchronizer = SessionSynchronizer<MemoryRemote, FsSessionStore, JournalHistory>;

/// Executor type wired by [`TestEnv`].
pub type TestExecutor = SyncExecutor<MemoryRemote, FsSessionStore, JournalHistory>;

/// Builds a journal with one entry per text.
pub fn journal_of(texts: &[&str]) -> Journal {
    Journal::new(texts.iter().map(|t| JournalEntry::new(*t)).collect())
}

/// Builds archive bytes holding a manifest and a journal.
pub fn archive_bytes(info: &SessionInfo, journal: &Journal) -> Vec<u8> {
    let manifest = serde_json::to_vec(info).expect("Failed to encode manifest");
    let history = serde_json::to_vec(journal).expect("Failed to encode journal");
    archive::build_archive(&[
        (archive::MANIFEST_ENTRY, manifest.as_slice()),
        (archive::HISTORY_ENTRY, history.as_slice()),
    ])
    .expect("Failed to build archive")
}

/// A session handle that counts notifications.
#[derive(Debug, Default)]
pub struct RecordingHandle {
    reloads: AtomicUsize,
    defaults: AtomicUsize,
}

impl RecordingHandle {
    /// Number of reload notifications.
    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    /// Number of switches to a default session.
    pub fn defaults(&self) -> usize {
        self.defaults.load(Ordering::SeqCst)
    }
}

impl SessionHandle for RecordingHandle {
    fn reload(&self) {
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }

    fn open_default_session(&self) {
        self.defaults.fetch_add(1, Ordering::SeqCst);
    }
}

/// A temporary sessions directory, an in-memory remote and the pieces
/// needed to synchronize them.
pub struct TestEnv {
    /// Local store.
    pub store: Arc<FsSessionStore>,
    /// Remote service.
    pub remote: Arc<MemoryRemote>,
    /// History strategy.
    pub history: Arc<JournalHistory>,
    /// Open session registry.
    pub open: Arc<OpenSessionRegistry>,
    _temp_dir: TempDir,
}

impl TestEnv {
    /// Creates a fresh environment.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = StoreConfig::new(temp_dir.path().join("sessions"))
            .with_executor(ExecutorConfig::new(2));
        let store = FsSessionStore::open(&config).expect("Failed to open session store");

        Self {
            store: Arc::new(store),
            remote: Arc::new(MemoryRemote::new()),
            history: Arc::new(JournalHistory::new()),
            open: Arc::new(OpenSessionRegistry::new()),
            _temp_dir: temp_dir,
        }
    }

    /// Sync configuration for [`ENV_PROJECT`].
    pub fn config(&self) -> SyncConfig {
        SyncConfig::new(ENV_PROJECT)
    }

    /// Builds a synchronizer with the given configuration.
    pub fn synchronizer_with(&self, config: SyncConfig) -> TestSynchronizer {
        SessionSynchronizer::new(
            Arc::clone(&self.remote),
            Arc::clone(&self.store),
            Arc::clone(&self.history),
            Arc::clone(&self.open),
            config,
        )
    }

    /// Builds a synchronizer for [`ENV_PROJECT`].
    pub fn synchronizer(&self) -> TestSynchronizer {
        self.synchronizer_with(self.config())
    }

    /// Builds a bare executor.
    pub fn executor(&self) -> TestExecutor {
        SyncExecutor::new(
            Arc::clone(&self.remote),
            Arc::clone(&self.store),
            Arc::clone(&self.history),
        )
    }

    /// Creates a local session whose journal holds `texts`.
    pub fn local_session(&self, name: &str, texts: &[&str]) -> SessionInfo {
        let info = self
            .store
            .create_session(name)
            .expect("Failed to create session");
        if texts.is_empty() {
            return info;
        }
        self.append_local(info.id, texts)
    }

    /// Appends entries to a local session's journal, bumping `modified`.
    pub fn append_local(&self, session_id: Uuid, texts: &[&str]) -> SessionInfo {
        let history = Arc::clone(&self.history);
        let journal = journal_of(texts);
        self.store
            .edit_session(session_id, move |_, path| {
                let mut current = history.load(path)?;
                current.entries.extend(journal.entries);
                history.store(&current, path)
            })
            .expect("Failed to edit session")
    }

    /// Reads the journal of a local session.
    pub fn local_journal(&self, session_id: Uuid) -> Journal {
        self.history
            .load(&self.store.archive_path(session_id))
            .expect("Failed to read local journal")
    }

    /// Seeds a remote session with a fresh id.
    pub fn seed_remote(&self, name: &str, modified: i64, journal: &Journal) -> RemoteSessionMeta {
        self.seed_remote_with_id(Uuid::new_v4(), name, modified, journal)
    }

    /// Seeds a remote session under `session_id`.
    pub fn seed_remote_with_id(
        &self,
        session_id: Uuid,
        name: &str,
        modified: i64,
        journal: &Journal,
    ) -> RemoteSessionMeta {
        let info = SessionInfo::new(session_id, name, modified, modified);
        let meta = RemoteSessionMeta::new(session_id, name, ENV_PROJECT, modified);
        self.remote.insert(meta.clone(), archive_bytes(&info, journal));
        meta
    }

    /// Registers a recording handle as the open view of a session.
    pub fn open_session(&self, session_id: Uuid) -> Arc<RecordingHandle> {
        let handle = Arc::new(RecordingHandle::default());
        self.open.register(session_id, handle.clone());
        handle
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
