//! # Sessync Testkit
//!
//! Test utilities for sessync.
//!
//! This crate provides:
//! - Property-based generators for planner inputs
//! - A temporary environment wiring a filesystem store to an in-memory remote
//! - Recording session handles
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sessync_testkit::prelude::*;
//!
//! #[test]
//! fn downloads_remote_session() {
//!     let env = TestEnv::new();
//!     let meta = env.seed_remote("Remote", 100, &journal_of(&["hi"]));
//!     env.synchronizer().synchronize().unwrap();
//!     assert!(env.store.get(meta.id).is_some());
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
