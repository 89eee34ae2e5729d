//! Integration tests for the convergence loop.

use sessync_engine::{
    EngineResult, ExecutorConfig, MemoryRemote, OpenSessionRegistry, RemoteSessionMeta,
    RemoteSessionService, SessionSynchronizer, SyncConfig, SyncError,
};
use sessync_store::{FsSessionStore, JournalEntry, JournalHistory, StoreConfig};
use sessync_testkit::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;
use uuid::Uuid;

/// A remote that edits a local session every time content is fetched,
/// simulating a user typing while sync runs.
struct EditingRemote {
    inner: MemoryRemote,
    store: OnceLock<Arc<FsSessionStore>>,
    target: Uuid,
    edits_left: AtomicUsize,
}

impl EditingRemote {
    fn edit_local(&self) {
        let consumed = self
            .edits_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !consumed {
            return;
        }
        if let Some(store) = self.store.get() {
            let history = JournalHistory::new();
            store
                .edit_session(self.target, move |_, path| {
                    history.append(path, JournalEntry::new("typed during sync"))?;
                    Ok(())
                })
                .unwrap();
        }
    }
}

impl RemoteSessionService for EditingRemote {
    fn list_sessions(&self, remote_project: &str) -> EngineResult<Vec<RemoteSessionMeta>> {
        self.inner.list_sessions(remote_project)
    }

    fn get_content(&self, session_id: Uuid) -> EngineResult<Vec<u8>> {
        let content = self.inner.get_content(session_id);
        self.edit_local();
        content
    }

    fn write_session(
        &self,
        session_id: Uuid,
        remote_project: &str,
        name: &str,
        modified_at_millis: i64,
        content: &[u8],
    ) -> EngineResult<()> {
        self.inner
            .write_session(session_id, remote_project, name, modified_at_millis, content)
    }

    fn delete_session(&self, session_id: Uuid) -> EngineResult<()> {
        self.inner.delete_session(session_id)
    }
}

struct EditingEnv {
    store: Arc<FsSessionStore>,
    remote: Arc<EditingRemote>,
    target: Uuid,
    _dir: TempDir,
}

/// A local session newer than its remote copy, with `edits` concurrent
/// edits queued.
fn editing_env(edits: usize) -> EditingEnv {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::new(dir.path()).with_executor(ExecutorConfig::new(2));
    let store = Arc::new(FsSessionStore::open(&config).unwrap());
    let local = store.create_session("Typing").unwrap();

    let remote = Arc::new(EditingRemote {
        inner: MemoryRemote::new(),
        store: OnceLock::new(),
        target: local.id,
        edits_left: AtomicUsize::new(edits),
    });
    // Older than the local copy, so every pass plans an upload.
    let remote_modified = local.modified - 1_000;
    let info = sessync_engine::SessionInfo::new(local.id, "Typing", 1, remote_modified);
    remote.inner.insert(
        RemoteSessionMeta::new(local.id, "Typing", ENV_PROJECT, remote_modified),
        archive_bytes(&info, &journal_of(&["remote"])),
    );
    let _ = remote.store.set(Arc::clone(&store));

    EditingEnv {
        store,
        remote,
        target: local.id,
        _dir: dir,
    }
}

fn editing_synchronizer(
    env: &EditingEnv,
    max_iterations: u32,
) -> SessionSynchronizer<EditingRemote, FsSessionStore, JournalHistory> {
    SessionSynchronizer::new(
        Arc::clone(&env.remote),
        Arc::clone(&env.store),
        Arc::new(JournalHistory::new()),
        Arc::new(OpenSessionRegistry::new()),
        SyncConfig::new(ENV_PROJECT).with_max_iterations(max_iterations),
    )
}

#[test]
fn converges_in_one_call() {
    let env = TestEnv::new();
    let upload = env.local_session("Local only", &["mine"]);
    let download = env.seed_remote("Remote only", 500, &journal_of(&["theirs"]));
    let tombstoned = env.local_session("Deleted here", &[]);
    env.seed_remote_with_id(tombstoned.id, "Deleted here", tombstoned.modified, &journal_of(&[]));
    env.store.delete_session(tombstoned.id).unwrap();

    let report = env.synchronizer().synchronize().unwrap();

    assert!(report.converged);
    assert!(!report.cap_reached);
    assert_eq!(report.iterations, 1);
    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 0);

    assert!(env.remote.meta(upload.id).is_some());
    assert!(env.store.get(download.id).is_some());
    assert!(env.remote.meta(tombstoned.id).unwrap().is_deleted());
    assert!(env.synchronizer().plan_once().unwrap().is_empty());
}

#[test]
fn empty_plan_converges_immediately() {
    let env = TestEnv::new();

    let report = env.synchronizer().synchronize().unwrap();

    assert!(report.converged);
    assert_eq!(report.iterations, 1);
    assert!(report.results.is_empty());
}

#[test]
fn listing_failure_propagates() {
    let env = TestEnv::new();
    env.local_session("Local", &[]);
    env.remote.set_offline(true);

    let err = env.synchronizer().synchronize().unwrap_err();

    assert!(matches!(err, SyncError::Remote { .. }));
    assert!(err.is_retryable());
}

#[test]
fn action_failures_are_reported_not_raised() {
    let env = TestEnv::new();
    let meta = env.seed_remote("Flaky", 10, &journal_of(&[]));
    env.remote.fail_content_for(meta.id);

    let report = env.synchronizer().synchronize().unwrap();

    assert_eq!(report.failed(), 1);
    assert_eq!(report.iterations, 1);
    assert!(env.store.get(meta.id).is_none());
}

#[test]
fn other_projects_are_ignored() {
    let env = TestEnv::new();
    let other = Uuid::new_v4();
    env.remote.insert(
        RemoteSessionMeta::new(other, "Elsewhere", "another-project", 10),
        Vec::new(),
    );

    let report = env.synchronizer().synchronize().unwrap();

    assert_eq!(report.succeeded(), 0);
    assert!(env.store.get(other).is_none());
}

#[test]
fn skipped_action_is_retried_next_iteration() {
    let env = editing_env(1);
    let sync = editing_synchronizer(&env, 10);

    let report = sync.synchronize().unwrap();

    assert_eq!(report.iterations, 2);
    assert_eq!(report.results[0].skipped.len(), 1);
    assert_eq!(report.results[1].succeeded, vec![env.target]);
    assert!(report.converged);

    let local = env.store.get(env.target).unwrap();
    let remote = env.remote.inner.meta(env.target).unwrap();
    assert_eq!(remote.modified_at_millis, local.modified);
}

#[test]
fn iteration_cap_bounds_perpetual_edits() {
    let env = editing_env(usize::MAX);
    let sync = editing_synchronizer(&env, 3);

    let report = sync.synchronize().unwrap();

    assert!(report.cap_reached);
    assert!(!report.converged);
    assert_eq!(report.iterations, 3);
    assert_eq!(report.results.len(), 3);
    assert!(report.results.iter().all(|r| r.skipped.len() == 1));
    assert!(env.remote.inner.calls().uploaded.is_empty());
}
