//! Store configuration.

use sessync_engine::ExecutorConfig;
use std::path::{Path, PathBuf};

/// Configuration for opening a [`FsSessionStore`](crate::FsSessionStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Directory holding session archives and marker files.
    pub sessions_dir: PathBuf,
    /// Create the directory if it does not exist.
    pub create_if_missing: bool,
    /// Settings for the session executor the store creates.
    pub executor: ExecutorConfig,
}

impl StoreConfig {
    /// Creates a configuration for a sessions directory.
    pub fn new(sessions_dir: impl AsRef<Path>) -> Self {
        Self {
            sessions_dir: sessions_dir.as_ref().to_path_buf(),
            create_if_missing: true,
            executor: ExecutorConfig::default(),
        }
    }

    /// Sets whether a missing directory is created.
    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    /// Sets the executor configuration.
    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }
}
