//! Property-based test generators using proptest.
//!
//! Ids are drawn from a small shared pool so local, remote and marker sets
//! overlap often enough to exercise every planner rule.

use proptest::prelude::*;
use sessync_engine::{RemoteSessionMeta, SessionInfo};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Project name used by generated remote metadata.
pub const TEST_PROJECT: &str = "proptest";

/// Strategy for generating session ids.
pub fn session_id_strategy() -> impl Strategy<Value = Uuid> {
    prop::array::uniform16(any::<u8>()).prop_map(Uuid::from_bytes)
}

/// Strategy for generating timestamps. The range is narrow so equal
/// timestamps on both sides are common.
pub fn timestamp_strategy() -> impl Strategy<Value = i64> {
    0i64..8
}

/// Strategy for generating local session metadata.
pub fn session_info_strategy() -> impl Strategy<Value = SessionInfo> {
    (session_id_strategy(), timestamp_strategy(), 0i64..4).prop_map(|(id, created, delta)| {
        SessionInfo::new(id, format!("session {created}"), created, created + delta)
    })
}

/// How one session id appears in a generated [`SyncState`].
#[derive(Debug, Clone)]
struct Presence {
    local: Option<i64>,
    remote: Option<(i64, bool)>,
    tombstone: bool,
    unreadable: bool,
}

fn presence_strategy() -> impl Strategy<Value = Presence> {
    (
        prop::option::of(timestamp_strategy()),
        prop::option::of((timestamp_strategy(), any::<bool>())),
        prop::bool::weighted(0.2),
        prop::bool::weighted(0.2),
    )
        .prop_map(|(local, remote, tombstone, unreadable)| Presence {
            local,
            remote,
            tombstone,
            unreadable,
        })
}

/// The four snapshots the planner consumes.
#[derive(Debug, Clone, Default)]
pub struct SyncState {
    /// Local session cache.
    pub local: HashMap<Uuid, SessionInfo>,
    /// Remote listing.
    pub remote: Vec<RemoteSessionMeta>,
    /// Local tombstones.
    pub tombstones: HashSet<Uuid>,
    /// Remote sessions known to be unreadable.
    pub unreadable: HashSet<Uuid>,
}

/// Strategy for generating planner inputs over up to `max_sessions` ids.
pub fn sync_state_strategy(max_sessions: usize) -> impl Strategy<Value = SyncState> {
    prop::collection::vec((session_id_strategy(), presence_strategy()), 0..=max_sessions).prop_map(
        |sessions| {
            let mut state = SyncState::default();
            for (id, presence) in sessions {
                if let Some(modified) = presence.local {
                    state
                        .local
                        .insert(id, SessionInfo::new(id, "local", 0, modified));
                }
                if let Some((modified, deleted)) = presence.remote {
                    let meta = RemoteSessionMeta::new(id, "remote", TEST_PROJECT, modified);
                    state.remote.push(if deleted {
                        meta.deleted_at(modified + 1)
                    } else {
                        meta
                    });
                }
                if presence.tombstone {
                    state.tombstones.insert(id);
                }
                if presence.unreadable {
                    state.unreadable.insert(id);
                }
            }
            state
        },
    )
}
