//! # Sessync Engine
//!
//! Bidirectional synchronization of locally stored sessions with a remote
//! session service.
//!
//! This crate provides:
//! - A pure planner turning local, remote and marker snapshots into actions
//! - An executor applying actions with a local-modification guard
//! - A history merge path for sessions edited on both sides
//! - A convergence loop that re-plans when sessions change mid-pass
//! - A per-key serial executor isolating work on each session
//!
//! ## Architecture
//!
//! The engine is written against four collaborator traits:
//! [`RemoteSessionService`], [`LocalSessionStore`], [`HistoryStrategy`] and
//! [`SessionHandle`]. The `sessync_store` crate provides filesystem-backed
//! implementations.
//!
//! ## Key Invariants
//!
//! - A tombstoned session is never downloaded or uploaded
//! - Remote deletions run before downloads, uploads run last
//! - A session changed after planning is skipped, never overwritten
//! - Local mutations of a session run on that session's serial queue
//! - Sessions found unreadable are never downloaded again

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod executor;
mod handle;
mod history;
mod keyed;
mod merge;
mod model;
mod planner;
mod remote;
mod store;
mod synchronizer;

pub use config::{ExecutorConfig, SyncConfig, DEFAULT_MAX_ITERATIONS};
pub use error::{EngineResult, SyncError};
pub use executor::SyncExecutor;
pub use handle::{OpenSessionRegistry, OpenSessions, SessionHandle};
pub use history::HistoryStrategy;
pub use keyed::{KeyedExecutor, TaskHandle};
pub use merge::{merge_and_save, MergeInput, MergeOutcome, MergeSource};
pub use model::{
    now_millis, ActionType, RemoteSessionMeta, SessionInfo, SyncAction, SyncReport, SyncResult,
};
pub use planner::SyncPlanner;
pub use remote::{MemoryRemote, RemoteCalls, RemoteSessionService};
pub use store::LocalSessionStore;
pub use synchronizer::SessionSynchronizer;
