//! History merge strategy.

use crate::error::EngineResult;
use std::path::Path;

/// Decodes, compares and merges the conversation history stored in session
/// archives.
///
/// The engine treats snapshots as opaque: it only asks whether two of them
/// diverged and, if so, for their merge.
pub trait HistoryStrategy: Send + Sync + 'static {
    /// Decoded history.
    type Snapshot: Send;

    /// Reads the history stored in an archive.
    fn read(&self, archive: &Path) -> EngineResult<Self::Snapshot>;

    /// Writes `snapshot` as the history of the archive at `archive`,
    /// replacing the file.
    fn write(&self, snapshot: &Self::Snapshot, archive: &Path) -> EngineResult<()>;

    /// Returns true if the snapshots differ in content.
    fn diverged(&self, local: &Self::Snapshot, remote: &Self::Snapshot) -> bool;

    /// Merges `overlay` onto `base`.
    fn merge(&self, base: Self::Snapshot, overlay: Self::Snapshot) -> Self::Snapshot;
}
