//! # Sessync Store
//!
//! Filesystem implementations of the sessync engine's collaborators.
//!
//! This crate provides:
//! - [`FsSessionStore`]: a directory of ZIP session archives with an
//!   in-memory metadata cache, tombstones and an unreadable folder
//! - [`JournalHistory`]: an append-only history with entry-level merge
//! - [`DirectoryRemote`]: a shared directory standing in for the remote
//!   session service
//!
//! ## Example
//!
//! ```rust,ignore
//! use sessync_engine::{OpenSessionRegistry, SessionSynchronizer, SyncConfig};
//! use sessync_store::{DirectoryRemote, FsSessionStore, JournalHistory, StoreConfig};
//! use std::sync::Arc;
//!
//! let store = Arc::new(FsSessionStore::open(&StoreConfig::new("sessions"))?);
//! let remote = Arc::new(DirectoryRemote::open("remote")?);
//! let sync = SessionSynchronizer::new(
//!     remote,
//!     store,
//!     Arc::new(JournalHistory::new()),
//!     Arc::new(OpenSessionRegistry::new()),
//!     SyncConfig::new("my-project"),
//! );
//! let report = sync.synchronize()?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod archive;
mod config;
mod error;
mod history;
mod markers;
mod remote_dir;
mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use history::{Journal, JournalEntry, JournalHistory};
pub use markers::MarkerSet;
pub use remote_dir::DirectoryRemote;
pub use store::{FsSessionStore, QuarantineReport};
