//! Opening the local store and remote named on the command line.

use sessync_engine::{OpenSessionRegistry, SessionSynchronizer, SyncConfig};
use sessync_store::{DirectoryRemote, FsSessionStore, JournalHistory, StoreConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Result type for command implementations.
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Synchronizer wired to the on-disk store and directory remote.
pub type CliSynchronizer = SessionSynchronizer<DirectoryRemote, FsSessionStore, JournalHistory>;

/// Locations and project shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    sessions_dir: PathBuf,
    remote_dir: Option<PathBuf>,
    project: String,
}

impl Context {
    /// Context for one invocation. `remote_dir` is only needed by remote commands.
    pub fn new(sessions_dir: PathBuf, remote_dir: Option<PathBuf>, project: String) -> Self {
        Self {
            sessions_dir,
            remote_dir,
            project,
        }
    }

    /// Remote project whose sessions are synchronized.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Opens the sessions directory, taking its lock for the life of the store.
    pub fn open_store(&self) -> CliResult<Arc<FsSessionStore>> {
        let config = StoreConfig::new(&self.sessions_dir);
        let store = FsSessionStore::open(&config)?;
        let quarantined = store.quarantined_at_open();
        if !quarantined.is_empty() {
            warn!(
                sessions = ?quarantined.sessions,
                unnamed = ?quarantined.unnamed,
                "moved unreadable archives to {}",
                store.root().join("unreadable").display()
            );
        }
        Ok(Arc::new(store))
    }

    /// Opens the shared remote directory. Fails if none was given.
    pub fn open_remote(&self) -> CliResult<Arc<DirectoryRemote>> {
        let dir = self
            .remote_dir
            .as_ref()
            .ok_or("Remote directory required (--remote-dir)")?;
        Ok(Arc::new(DirectoryRemote::open(dir)?))
    }

    /// Default sync settings for the configured project.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::new(self.project.clone())
    }

    /// Builds a synchronizer over the local store and the remote directory.
    pub fn synchronizer(&self, config: SyncConfig) -> CliResult<CliSynchronizer> {
        let remote = self.open_remote()?;
        let store = self.open_store()?;
        Ok(SessionSynchronizer::new(
            remote,
            store,
            Arc::new(JournalHistory::new()),
            Arc::new(OpenSessionRegistry::new()),
            config,
        ))
    }
}
