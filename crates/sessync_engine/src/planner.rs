//! Sync planning.
//!
//! The planner is a pure function of four snapshots: the local session cache,
//! the remote listing, the local tombstones and the set of remote sessions
//! known to be unreadable. It performs no I/O.

use crate::model::{ActionType, RemoteSessionMeta, SessionInfo, SyncAction};
use std::cmp::Reverse;
use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;

/// Computes the ordered list of actions that brings local and remote state
/// together.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncPlanner;

impl SyncPlanner {
    /// Creates a new planner.
    pub fn new() -> Self {
        Self
    }

    /// Plans the actions for one synchronization pass.
    ///
    /// The returned list runs remote deletions first, then downloads and
    /// local deletions (most recently modified remote first), then uploads.
    pub fn plan(
        &self,
        local_sessions: &HashMap<Uuid, SessionInfo>,
        remote_sessions: &[RemoteSessionMeta],
        tombstones: &HashSet<Uuid>,
        unreadable: &HashSet<Uuid>,
    ) -> Vec<SyncAction> {
        let mut remote_map: HashMap<Uuid, &RemoteSessionMeta> = HashMap::new();
        for meta in remote_sessions {
            remote_map.entry(meta.id).or_insert(meta);
        }

        let all_ids: BTreeSet<Uuid> = local_sessions
            .keys()
            .chain(remote_map.keys())
            .chain(tombstones.iter())
            .copied()
            .collect();

        let mut actions = Vec::new();
        for id in all_ids {
            let local = local_sessions.get(&id);
            let remote = remote_map.get(&id).copied();

            if let Some(action) = plan_session(id, local, remote, tombstones, unreadable) {
                actions.push(action);
            }
        }

        // Stable sort over ids visited in ascending order keeps ties deterministic.
        actions.sort_by_key(|a| (a.action_type.priority(), Reverse(a.remote_modified())));
        actions
    }
}

fn plan_session(
    id: Uuid,
    local: Option<&SessionInfo>,
    remote: Option<&RemoteSessionMeta>,
    tombstones: &HashSet<Uuid>,
    unreadable: &HashSet<Uuid>,
) -> Option<SyncAction> {
    let action = |action_type| SyncAction::new(id, action_type, local.cloned(), remote.cloned());

    // A tombstone hides any stale local content.
    if tombstones.contains(&id) {
        return match remote {
            Some(meta) if !meta.is_deleted() => Some(action(ActionType::DeleteRemote)),
            _ => None,
        };
    }

    match (local, remote) {
        (None, None) => None,
        (Some(_), None) => Some(action(ActionType::Upload)),
        (local, Some(meta)) if meta.is_deleted() => {
            let local = local?;
            let deleted_at = meta.deleted_at_millis.unwrap_or_default();
            if deleted_at > local.modified {
                Some(action(ActionType::DeleteLocal))
            } else {
                Some(action(ActionType::Upload))
            }
        }
        (_, Some(_)) if unreadable.contains(&id) => None,
        (None, Some(_)) => Some(action(ActionType::Download)),
        (Some(local), Some(meta)) => {
            if meta.modified_at_millis > local.modified {
                Some(action(ActionType::Download))
            } else if local.modified > meta.modified_at_millis {
                Some(action(ActionType::Upload))
            } else {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROJECT: &str = "remote-project";

    fn local(id: Uuid, modified: i64) -> SessionInfo {
        SessionInfo::new(id, "Test Session", modified - 1000, modified)
    }

    fn remote(id: Uuid, modified: i64) -> RemoteSessionMeta {
        RemoteSessionMeta::new(id, "Test Session", PROJECT, modified)
    }

    fn plan(
        local: &[SessionInfo],
        remote: &[RemoteSessionMeta],
        tombstones: &[Uuid],
        unreadable: &[Uuid],
    ) -> Vec<SyncAction> {
        let local = local.iter().map(|s| (s.id, s.clone())).collect();
        let tombstones = tombstones.iter().copied().collect();
        let unreadable = unreadable.iter().copied().collect();
        SyncPlanner::new().plan(&local, remote, &tombstones, &unreadable)
    }

    fn types(actions: &[SyncAction]) -> Vec<ActionType> {
        actions.iter().map(|a| a.action_type).collect()
    }

    #[test]
    fn uploads_local_only_session() {
        let id = Uuid::new_v4();
        let info = local(id, 100);
        let actions = plan(&[info.clone()], &[], &[], &[]);

        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].session_id, id);
        assert_eq!(actions[0].action_type, ActionType::Upload);
        assert_eq!(actions[0].local_info, Some(info));
        assert_eq!(actions[0].remote_meta, None);
    }

    #[test]
    fn downloads_remote_only_session() {
        let id = Uuid::new_v4();
        let meta = remote(id, 200);
        let actions = plan(&[], &[meta.clone()], &[], &[]);

        assert_eq!(types(&actions), vec![ActionType::Download]);
        assert_eq!(actions[0].remote_meta, Some(meta));
        assert_eq!(actions[0].local_info, None);
    }

    #[test]
    fn newer_side_wins() {
        let id = Uuid::new_v4();

        let actions = plan(&[local(id, 300)], &[remote(id, 200)], &[], &[]);
        assert_eq!(types(&actions), vec![ActionType::Upload]);

        let actions = plan(&[local(id, 1000)], &[remote(id, 2000)], &[], &[]);
        assert_eq!(types(&actions), vec![ActionType::Download]);

        let actions = plan(&[local(id, 2000)], &[remote(id, 2000)], &[], &[]);
        assert!(actions.is_empty());
    }

    #[test]
    fn remote_deletion_after_local_edit_deletes_local() {
        let id = Uuid::new_v4();
        let meta = remote(id, 50).deleted_at(150);
        let actions = plan(&[local(id, 100)], &[meta], &[], &[]);
        assert_eq!(types(&actions), vec![ActionType::DeleteLocal]);
    }

    #[test]
    fn local_edit_after_remote_deletion_resurrects() {
        let id = Uuid::new_v4();
        let meta = remote(id, 50).deleted_at(150);
        let actions = plan(&[local(id, 500)], &[meta], &[], &[]);
        assert_eq!(types(&actions), vec![ActionType::Upload]);
    }

    #[test]
    fn equal_deletion_and_edit_times_keep_local() {
        let id = Uuid::new_v4();
        let meta = remote(id, 50).deleted_at(100);
        let actions = plan(&[local(id, 100)], &[meta], &[], &[]);
        assert_eq!(types(&actions), vec![ActionType::Upload]);
    }

    #[test]
    fn remote_deleted_without_local_is_ignored() {
        let id = Uuid::new_v4();
        let actions = plan(&[], &[remote(id, 50).deleted_at(70)], &[], &[]);
        assert!(actions.is_empty());
    }

    #[test]
    fn tombstone_deletes_remote() {
        let id = Uuid::new_v4();
        let actions = plan(&[local(id, 5000)], &[remote(id, 2000)], &[id], &[]);
        assert_eq!(types(&actions), vec![ActionType::DeleteRemote]);
    }

    #[test]
    fn tombstone_without_active_remote_is_ignored() {
        let id = Uuid::new_v4();
        assert!(plan(&[], &[], &[id], &[]).is_empty());

        let deleted = remote(id, 2000).deleted_at(2500);
        assert!(plan(&[local(id, 1000)], &[deleted], &[id], &[]).is_empty());
    }

    #[test]
    fn skips_unreadable_remote_sessions() {
        let id = Uuid::new_v4();
        assert!(plan(&[], &[remote(id, 2000)], &[], &[id]).is_empty());
        assert!(plan(&[local(id, 9000)], &[remote(id, 2000)], &[], &[id]).is_empty());
    }

    #[test]
    fn unreadable_marker_does_not_block_first_upload() {
        let id = Uuid::new_v4();
        let actions = plan(&[local(id, 100)], &[], &[], &[id]);
        assert_eq!(types(&actions), vec![ActionType::Upload]);
    }

    #[test]
    fn duplicate_remote_entries_use_first() {
        let id = Uuid::new_v4();
        let actions = plan(
            &[local(id, 1500)],
            &[remote(id, 1000), remote(id, 3000)],
            &[],
            &[],
        );
        assert_eq!(types(&actions), vec![ActionType::Upload]);
    }

    #[test]
    fn prioritizes_actions() {
        let delete_remote = Uuid::new_v4();
        let download_new = Uuid::new_v4();
        let download_old = Uuid::new_v4();
        let upload = Uuid::new_v4();
        let base = 10_000;

        let actions = plan(
            &[
                local(download_new, base),
                local(download_old, base),
                local(upload, base),
            ],
            &[
                remote(delete_remote, base),
                remote(download_new, base + 2000),
                remote(download_old, base + 1000),
            ],
            &[delete_remote],
            &[],
        );

        let ids: Vec<(ActionType, Uuid)> =
            actions.iter().map(|a| (a.action_type, a.session_id)).collect();
        assert_eq!(
            ids,
            vec![
                (ActionType::DeleteRemote, delete_remote),
                (ActionType::Download, download_new),
                (ActionType::Download, download_old),
                (ActionType::Upload, upload),
            ]
        );
    }

    #[test]
    fn delete_local_interleaves_with_downloads_by_remote_time() {
        let fresh = Uuid::new_v4();
        let gone = Uuid::new_v4();
        let stale = Uuid::new_v4();

        let actions = plan(
            &[local(gone, 100)],
            &[
                remote(fresh, 900),
                remote(gone, 500).deleted_at(600),
                remote(stale, 300),
            ],
            &[],
            &[],
        );

        let ids: Vec<Uuid> = actions.iter().map(|a| a.session_id).collect();
        assert_eq!(ids, vec![fresh, gone, stale]);
        assert_eq!(actions[1].action_type, ActionType::DeleteLocal);
    }
}
