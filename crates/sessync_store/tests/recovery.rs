//! Recovery of session archives that cannot be read when the store opens.

use sessync_engine::{
    now_millis, LocalSessionStore, MemoryRemote, OpenSessionRegistry, RemoteSessionMeta,
    SessionInfo, SessionSynchronizer, SyncConfig,
};
use sessync_store::archive::{self, HISTORY_ENTRY, MANIFEST_ENTRY};
use sessync_store::{FsSessionStore, JournalHistory, StoreConfig};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

const PROJECT: &str = "shared";

fn remote_archive(id: Uuid, name: &str, modified: i64) -> Vec<u8> {
    let manifest = serde_json::to_vec(&SessionInfo::new(id, name, modified, modified)).unwrap();
    archive::build_archive(&[
        (MANIFEST_ENTRY, manifest.as_slice()),
        (HISTORY_ENTRY, b"[]".as_slice()),
    ])
    .unwrap()
}

#[test]
fn corrupt_local_archive_survives_a_later_sync() {
    let dir = TempDir::new().unwrap();
    let id = Uuid::new_v4();
    let junk = b"half written archive".to_vec();
    fs::write(dir.path().join(format!("{id}.zip")), &junk).unwrap();

    let modified = now_millis();
    let remote = Arc::new(MemoryRemote::new());
    remote.insert(
        RemoteSessionMeta::new(id, "Remote copy", PROJECT, modified),
        remote_archive(id, "Remote copy", modified),
    );

    let store = Arc::new(FsSessionStore::open(&StoreConfig::new(dir.path())).unwrap());
    assert_eq!(store.quarantined_at_open().sessions, vec![id]);

    let synchronizer = SessionSynchronizer::new(
        Arc::clone(&remote),
        Arc::clone(&store),
        Arc::new(JournalHistory::new()),
        Arc::new(OpenSessionRegistry::new()),
        SyncConfig::new(PROJECT),
    );
    let report = synchronizer.synchronize().unwrap();

    assert_eq!(report.failed(), 0);
    assert!(remote.calls().downloaded.is_empty());
    assert!(!store.archive_path(id).exists());
    assert!(store.get(id).is_none());
    assert_eq!(
        fs::read(dir.path().join("unreadable").join(format!("{id}.zip"))).unwrap(),
        junk
    );
}

#[test]
fn quarantined_session_stays_put_across_reopen() {
    let dir = TempDir::new().unwrap();
    let id = Uuid::new_v4();
    fs::write(dir.path().join(format!("{id}.zip")), b"garbage").unwrap();

    let first = FsSessionStore::open(&StoreConfig::new(dir.path())).unwrap();
    assert_eq!(first.quarantined_at_open().len(), 1);
    drop(first);

    let second = FsSessionStore::open(&StoreConfig::new(dir.path())).unwrap();
    assert!(second.quarantined_at_open().is_empty());
    assert!(second.unreadable_sessions().unwrap().contains(&id));
}
