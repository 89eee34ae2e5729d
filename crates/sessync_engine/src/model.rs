//! Session records exchanged between the local store, the remote service
//! and the planner.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

use crate::error::SyncError;

/// Returns the current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Local session metadata, stored as the manifest of a session archive and
/// mirrored in the store's in-memory cache.
///
/// `created` never changes once a session is first persisted; `modified`
/// increases on every content-changing write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Creation time (epoch millis).
    pub created: i64,
    /// Last modification time (epoch millis).
    pub modified: i64,
}

impl SessionInfo {
    /// Creates a new session record.
    pub fn new(id: Uuid, name: impl Into<String>, created: i64, modified: i64) -> Self {
        Self {
            id,
            name: name.into(),
            created,
            modified,
        }
    }

    /// Returns true if the session was changed after it was created.
    pub fn is_modified(&self) -> bool {
        self.created != self.modified
    }
}

/// Remote session metadata as reported by the remote session service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteSessionMeta {
    /// Session identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Remote project the session belongs to.
    pub remote_project: String,
    /// Last modification time on the remote (epoch millis).
    pub modified_at_millis: i64,
    /// Soft-deletion time, if the session was deleted remotely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at_millis: Option<i64>,
}

impl RemoteSessionMeta {
    /// Creates metadata for an active remote session.
    pub fn new(
        id: Uuid,
        name: impl Into<String>,
        remote_project: impl Into<String>,
        modified_at_millis: i64,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            remote_project: remote_project.into(),
            modified_at_millis,
            deleted_at_millis: None,
        }
    }

    /// Marks the metadata as soft-deleted at the given time.
    pub fn deleted_at(mut self, deleted_at_millis: i64) -> Self {
        self.deleted_at_millis = Some(deleted_at_millis);
        self
    }

    /// Returns true if the remote session is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at_millis.is_some()
    }
}

/// Kind of work the planner asks the executor to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    /// Fetch remote content into the local store.
    Download,
    /// Publish local content to the remote.
    Upload,
    /// Propagate a local tombstone to the remote.
    DeleteRemote,
    /// Remove a local session deleted on the remote.
    DeleteLocal,
    /// Nothing to do.
    NoOp,
}

impl ActionType {
    /// Execution priority: lower runs first.
    pub fn priority(&self) -> u8 {
        match self {
            ActionType::DeleteRemote => 0,
            ActionType::Download | ActionType::DeleteLocal => 1,
            ActionType::Upload | ActionType::NoOp => 2,
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionType::Download => "DOWNLOAD",
            ActionType::Upload => "UPLOAD",
            ActionType::DeleteRemote => "DELETE_REMOTE",
            ActionType::DeleteLocal => "DELETE_LOCAL",
            ActionType::NoOp => "NO_OP",
        };
        f.write_str(name)
    }
}

/// A single planned synchronization step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncAction {
    /// Session the action applies to.
    pub session_id: Uuid,
    /// What to do.
    pub action_type: ActionType,
    /// Local metadata captured at planning time.
    pub local_info: Option<SessionInfo>,
    /// Remote metadata captured at planning time.
    pub remote_meta: Option<RemoteSessionMeta>,
}

impl SyncAction {
    /// Creates a new action.
    pub fn new(
        session_id: Uuid,
        action_type: ActionType,
        local_info: Option<SessionInfo>,
        remote_meta: Option<RemoteSessionMeta>,
    ) -> Self {
        Self {
            session_id,
            action_type,
            local_info,
            remote_meta,
        }
    }

    /// Remote modification time used for ordering, zero when there is none.
    pub fn remote_modified(&self) -> i64 {
        self.remote_meta
            .as_ref()
            .map_or(0, |meta| meta.modified_at_millis)
    }
}

/// Outcome of one execution pass.
#[derive(Debug, Default)]
pub struct SyncResult {
    /// Sessions whose action was applied.
    pub succeeded: Vec<Uuid>,
    /// Sessions whose action failed, with the cause.
    pub failed: HashMap<Uuid, SyncError>,
    /// Actions abandoned because the local session changed after planning.
    pub skipped: Vec<SyncAction>,
}

impl SyncResult {
    /// Creates an empty result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if nothing failed and nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Summary of one `synchronize()` call.
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Number of plan/execute iterations started.
    pub iterations: u32,
    /// True if the loop ended with an empty plan or a pass that skipped
    /// nothing.
    pub converged: bool,
    /// True if the loop stopped at the iteration cap.
    pub cap_reached: bool,
    /// Execution results, one per executed iteration.
    pub results: Vec<SyncResult>,
}

impl SyncReport {
    /// Total number of applied actions across all iterations.
    pub fn succeeded(&self) -> usize {
        self.results.iter().map(|r| r.succeeded.len()).sum()
    }

    /// Total number of failed actions across all iterations.
    pub fn failed(&self) -> usize {
        self.results.iter().map(|r| r.failed.len()).sum()
    }

    /// Total number of skipped actions across all iterations.
    pub fn skipped(&self) -> usize {
        self.results.iter().map(|r| r.skipped.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_priorities() {
        assert!(ActionType::DeleteRemote.priority() < ActionType::Download.priority());
        assert_eq!(
            ActionType::Download.priority(),
            ActionType::DeleteLocal.priority()
        );
        assert!(ActionType::DeleteLocal.priority() < ActionType::Upload.priority());
    }

    #[test]
    fn action_type_display() {
        assert_eq!(ActionType::DeleteRemote.to_string(), "DELETE_REMOTE");
        assert_eq!(ActionType::NoOp.to_string(), "NO_OP");
    }

    #[test]
    fn session_info_modified_flag() {
        let id = Uuid::new_v4();
        assert!(!SessionInfo::new(id, "a", 10, 10).is_modified());
        assert!(SessionInfo::new(id, "a", 10, 20).is_modified());
    }

    #[test]
    fn manifest_ignores_unknown_fields() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"id":"{id}","name":"n","created":1,"modified":2,"extra":true}}"#
        );
        let info: SessionInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(info, SessionInfo::new(id, "n", 1, 2));
    }

    #[test]
    fn remote_meta_soft_delete() {
        let meta = RemoteSessionMeta::new(Uuid::new_v4(), "n", "proj", 100);
        assert!(!meta.is_deleted());
        let meta = meta.deleted_at(150);
        assert!(meta.is_deleted());
        assert_eq!(meta.deleted_at_millis, Some(150));
    }
}
