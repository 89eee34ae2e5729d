//! Applies planned actions against the remote service and the local store.

use crate::config::SyncConfig;
use crate::error::{EngineResult, SyncError};
use crate::handle::{OpenSessions, SessionHandle};
use crate::history::HistoryStrategy;
use crate::merge::{merge_and_save, MergeInput};
use crate::model::{ActionType, SyncAction, SyncResult};
use crate::remote::RemoteSessionService;
use crate::store::LocalSessionStore;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What happened to a single action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Applied,
    /// The local session changed after planning.
    Stale,
}

/// Upload payload read from the local archive inside the session queue.
struct UploadPayload {
    name: String,
    modified: i64,
    bytes: Vec<u8>,
}

enum UploadStep {
    Stale,
    Ready(UploadPayload),
}

/// Executes sync actions.
///
/// Local mutations run inside the store's serial executor under the action's
/// session id; remote calls run outside it. Every action ends up in exactly
/// one of `succeeded`, `failed` or `skipped`, except `NoOp` which is ignored.
pub struct SyncExecutor<R, S, H> {
    remote: Arc<R>,
    store: Arc<S>,
    history: Arc<H>,
    merge_before_upload: bool,
}

impl<R, S, H> SyncExecutor<R, S, H>
where
    R: RemoteSessionService,
    S: LocalSessionStore,
    H: HistoryStrategy,
{
    /// Creates an executor.
    pub fn new(remote: Arc<R>, store: Arc<S>, history: Arc<H>) -> Self {
        Self {
            remote,
            store,
            history,
            merge_before_upload: true,
        }
    }

    /// Creates an executor configured from a [`SyncConfig`].
    pub fn with_config(
        remote: Arc<R>,
        store: Arc<S>,
        history: Arc<H>,
        config: &SyncConfig,
    ) -> Self {
        Self::new(remote, store, history).with_merge_before_upload(config.merge_before_upload)
    }

    /// Enables or disables fetching remote content before an upload.
    pub fn with_merge_before_upload(mut self, enabled: bool) -> Self {
        self.merge_before_upload = enabled;
        self
    }

    /// Executes `actions` in order.
    ///
    /// A failing action is recorded and does not stop the batch.
    pub fn execute(
        &self,
        actions: &[SyncAction],
        open: &OpenSessions,
        remote_project: &str,
    ) -> SyncResult {
        let mut result = SyncResult::new();

        for action in actions {
            let id = action.session_id;
            let handle = open.get(&id).cloned();
            let outcome = match action.action_type {
                ActionType::DeleteRemote => self.delete_remote(action),
                ActionType::DeleteLocal => self.delete_local(action, handle),
                ActionType::Download => self.download(action, handle),
                ActionType::Upload => self.upload(action, handle, remote_project),
                ActionType::NoOp => continue,
            };

            match outcome {
                Ok(Outcome::Applied) => {
                    debug!(session = %id, action = %action.action_type, "action applied");
                    result.succeeded.push(id);
                }
                Ok(Outcome::Stale) => {
                    info!(
                        session = %id,
                        action = %action.action_type,
                        "local session changed since planning, skipping"
                    );
                    result.skipped.push(action.clone());
                }
                Err(e) => {
                    warn!(
                        session = %id,
                        action = %action.action_type,
                        error = %e,
                        "sync action failed"
                    );
                    result.failed.insert(id, e);
                }
            }
        }

        result
    }

    fn delete_remote(&self, action: &SyncAction) -> EngineResult<Outcome> {
        let id = action.session_id;
        self.remote.delete_session(id)?;

        let store = Arc::clone(&self.store);
        self.store
            .session_executor()
            .run(id, move || store.remove_tombstone(id))??;
        info!(session = %id, "propagated local deletion to remote");
        Ok(Outcome::Applied)
    }

    fn delete_local(
        &self,
        action: &SyncAction,
        handle: Option<Arc<dyn SessionHandle>>,
    ) -> EngineResult<Outcome> {
        let id = action.session_id;
        let store = Arc::clone(&self.store);
        let planned = action.clone();

        self.store.session_executor().run(id, move || -> EngineResult<Outcome> {
            if local_changed_since(&*store, &planned) {
                return Ok(Outcome::Stale);
            }
            if store.delete_archive(id)? {
                info!(session = %id, "deleted local session removed on remote");
            }
            store.remove_cached(id);
            if let Some(handle) = handle {
                handle.open_default_session();
            }
            Ok(Outcome::Applied)
        })?
    }

    fn download(
        &self,
        action: &SyncAction,
        handle: Option<Arc<dyn SessionHandle>>,
    ) -> EngineResult<Outcome> {
        let id = action.session_id;
        let remote_meta = action
            .remote_meta
            .clone()
            .ok_or_else(|| invalid_action(action, "no remote metadata"))?;

        if local_changed_since(&*self.store, action) {
            return Ok(Outcome::Stale);
        }
        let content = self.remote.get_content(id)?;

        let store = Arc::clone(&self.store);
        let history = Arc::clone(&self.history);
        let planned = action.clone();

        self.store.session_executor().run(id, move || -> EngineResult<Outcome> {
            if local_changed_since(&*store, &planned) {
                return Ok(Outcome::Stale);
            }

            match &planned.local_info {
                None => save_fresh_download(&*store, id, &content, handle.as_ref())?,
                Some(local_info) => {
                    let input = MergeInput {
                        session_id: id,
                        remote_content: &content,
                        local_info: Some(local_info),
                        remote_meta: &remote_meta,
                        local_is_newer: false,
                    };
                    if let Err(e) = merge_and_save(&*store, &*history, input, handle.as_ref()) {
                        if matches!(e, SyncError::UnreadableRemote(_)) {
                            store.mark_unreadable(id, &content)?;
                        }
                        return Err(e);
                    }
                }
            }
            Ok(Outcome::Applied)
        })?
    }

    fn upload(
        &self,
        action: &SyncAction,
        handle: Option<Arc<dyn SessionHandle>>,
        remote_project: &str,
    ) -> EngineResult<Outcome> {
        let id = action.session_id;
        if action.local_info.is_none() {
            return Err(invalid_action(action, "no local metadata"));
        }
        if local_changed_since(&*self.store, action) {
            return Ok(Outcome::Stale);
        }

        // A soft-deleted remote is being resurrected; its old content is not
        // merged back.
        let remote_content = match &action.remote_meta {
            Some(meta) if self.merge_before_upload && !meta.is_deleted() => {
                match self.remote.get_content(id) {
                    Ok(content) => Some((content, meta.clone())),
                    Err(e) => {
                        warn!(
                            session = %id,
                            error = %e,
                            "could not fetch remote content before upload, uploading local copy"
                        );
                        None
                    }
                }
            }
            _ => None,
        };

        let store = Arc::clone(&self.store);
        let history = Arc::clone(&self.history);
        let planned = action.clone();

        let step = self.store.session_executor().run(id, move || -> EngineResult<UploadStep> {
            if local_changed_since(&*store, &planned) {
                return Ok(UploadStep::Stale);
            }

            if let Some((content, remote_meta)) = &remote_content {
                let input = MergeInput {
                    session_id: id,
                    remote_content: content,
                    local_info: planned.local_info.as_ref(),
                    remote_meta,
                    local_is_newer: true,
                };
                match merge_and_save(&*store, &*history, input, handle.as_ref()) {
                    Ok(_) => {}
                    Err(SyncError::UnreadableRemote(_)) => {
                        warn!(session = %id, "remote content unreadable, uploading local copy");
                    }
                    Err(e) => return Err(e),
                }
            }

            let bytes = store.read_archive(id)?.ok_or(SyncError::ArchiveMissing(id))?;
            let path = store.archive_path(id);
            let info = store.read_info(&path)?.ok_or_else(|| {
                SyncError::archive(format!("no manifest in {}", path.display()))
            })?;
            Ok(UploadStep::Ready(UploadPayload {
                name: info.name,
                modified: info.modified,
                bytes,
            }))
        })??;

        match step {
            UploadStep::Stale => Ok(Outcome::Stale),
            UploadStep::Ready(payload) => {
                self.remote.write_session(
                    id,
                    remote_project,
                    &payload.name,
                    payload.modified,
                    &payload.bytes,
                )?;
                info!(session = %id, bytes = payload.bytes.len(), "uploaded session");
                Ok(Outcome::Applied)
            }
        }
    }
}

/// True if the cache shows a modification strictly newer than the one the
/// action was planned against. A missing cache entry, or an action planned
/// without local metadata, is never stale.
fn local_changed_since<S: LocalSessionStore + ?Sized>(store: &S, action: &SyncAction) -> bool {
    let Some(planned) = &action.local_info else {
        return false;
    };
    store
        .cached(action.session_id)
        .is_some_and(|current| current.modified > planned.modified)
}

/// Writes a session that did not exist locally.
fn save_fresh_download<S: LocalSessionStore + ?Sized>(
    store: &S,
    id: Uuid,
    content: &[u8],
    handle: Option<&Arc<dyn SessionHandle>>,
) -> EngineResult<()> {
    store.write_archive(id, content)?;
    let path = store.archive_path(id);

    let info = match store.read_info(&path) {
        Ok(Some(info)) if info.id == id => Some(info),
        Ok(Some(info)) => {
            warn!(
                session = %id,
                manifest_id = %info.id,
                "downloaded manifest names another session"
            );
            None
        }
        Ok(None) => None,
        Err(e) => {
            warn!(session = %id, error = %e, "could not read downloaded manifest");
            None
        }
    };

    let Some(info) = info else {
        store.delete_archive(id)?;
        store.mark_unreadable(id, content)?;
        return Err(SyncError::UnreadableRemote(id));
    };

    store.put_cached(info);
    if let Some(handle) = handle {
        handle.reload();
    }
    info!(session = %id, "downloaded new session");
    Ok(())
}

fn invalid_action(action: &SyncAction, reason: &str) -> SyncError {
    SyncError::InvalidAction {
        action: action.action_type.to_string(),
        session_id: action.session_id,
        reason: reason.into(),
    }
}
