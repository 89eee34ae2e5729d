//! CLI command implementations.

pub mod edit;
pub mod list;
pub mod plan;
pub mod sync;
