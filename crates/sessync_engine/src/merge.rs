//! Reconciling a fetched remote archive with the local one.
//!
//! Runs inside the session's serial executor task.

use crate::error::{EngineResult, SyncError};
use crate::handle::SessionHandle;
use crate::history::HistoryStrategy;
use crate::model::{now_millis, RemoteSessionMeta, SessionInfo};
use crate::store::LocalSessionStore;
use std::fs;
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which side's content ended up in the local archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeSource {
    /// Local archive kept as is.
    Local,
    /// Remote archive copied over the local one.
    Remote,
    /// Both histories merged into a new archive.
    Merged,
}

/// Result of [`merge_and_save`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Manifest written to the local archive.
    pub info: SessionInfo,
    /// Where the content came from.
    pub source: MergeSource,
}

/// Inputs to [`merge_and_save`] describing both sides.
#[derive(Debug, Clone, Copy)]
pub struct MergeInput<'a> {
    /// Session being merged.
    pub session_id: Uuid,
    /// Archive bytes fetched from the remote.
    pub remote_content: &'a [u8],
    /// Local metadata current before the merge, if any.
    pub local_info: Option<&'a SessionInfo>,
    /// Remote metadata the content belongs to.
    pub remote_meta: &'a RemoteSessionMeta,
    /// True when called for an upload (local is the newer side).
    pub local_is_newer: bool,
}

/// Merges remote content into the local archive of a session and updates
/// its manifest and cache entry.
///
/// Returns [`SyncError::UnreadableRemote`] when the remote content cannot be
/// decoded; the local archive is left untouched in that case. An unreadable
/// local archive is treated as absent and the remote side wins.
pub fn merge_and_save<S, H>(
    store: &S,
    history: &H,
    input: MergeInput<'_>,
    open_handle: Option<&Arc<dyn SessionHandle>>,
) -> EngineResult<MergeOutcome>
where
    S: LocalSessionStore + ?Sized,
    H: HistoryStrategy + ?Sized,
{
    let id = input.session_id;
    let staging_dir = store.staging_dir();
    fs::create_dir_all(&staging_dir)?;

    // Removed on drop, whichever way this function returns.
    let mut staged = tempfile::Builder::new()
        .prefix(&format!("remote-{id}-"))
        .suffix(".zip")
        .tempfile_in(&staging_dir)?;
    staged.write_all(input.remote_content)?;
    staged.flush()?;

    let remote_history = history.read(staged.path()).map_err(|e| {
        warn!(session = %id, error = %e, "remote history is unreadable");
        SyncError::UnreadableRemote(id)
    })?;

    let local_path = store.archive_path(id);
    let local_history = if local_path.exists() {
        match history.read(&local_path) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(
                    session = %id,
                    error = %e,
                    "could not read local history for merge, using remote"
                );
                None
            }
        }
    } else {
        None
    };

    let remote_meta = input.remote_meta;
    let (source, modified, name) = match (local_history, input.local_info) {
        (Some(local_history), Some(local_info)) => {
            if history.diverged(&local_history, &remote_history) {
                let merged = if input.local_is_newer {
                    history.merge(remote_history, local_history)
                } else {
                    history.merge(local_history, remote_history)
                };
                if let Some(parent) = local_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                history.write(&merged, &local_path)?;
                let name = if input.local_is_newer {
                    local_info.name.clone()
                } else {
                    remote_meta.name.clone()
                };
                // A merge is a new edit on both sides.
                let modified = now_millis()
                    .max(local_info.modified + 1)
                    .max(remote_meta.modified_at_millis + 1);
                (MergeSource::Merged, modified, name)
            } else if input.local_is_newer {
                debug!(session = %id, "history matches remote, keeping local archive");
                (MergeSource::Local, local_info.modified, local_info.name.clone())
            } else {
                debug!(session = %id, "history matches remote, copying remote archive");
                store.write_archive(id, input.remote_content)?;
                (
                    MergeSource::Remote,
                    remote_meta.modified_at_millis,
                    remote_meta.name.clone(),
                )
            }
        }
        _ => {
            store.write_archive(id, input.remote_content)?;
            (
                MergeSource::Remote,
                remote_meta.modified_at_millis,
                remote_meta.name.clone(),
            )
        }
    };

    let created = input.local_info.map_or_else(now_millis, |info| info.created);
    let info = SessionInfo::new(id, name, created, modified);
    store.write_info(&local_path, &info)?;
    store.put_cached(info.clone());
    info!(session = %id, source = ?source, "saved synchronized session");

    let previous_modified = input.local_info.map(|info| info.modified);
    if previous_modified != Some(modified) {
        if let Some(handle) = open_handle {
            handle.reload();
        }
    }

    if let Err(e) = staged.close() {
        warn!(session = %id, error = %e, "failed to remove staged remote archive");
    }

    Ok(MergeOutcome { info, source })
}
