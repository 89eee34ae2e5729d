//! The plan/execute convergence loop.

use crate::config::SyncConfig;
use crate::error::EngineResult;
use crate::executor::SyncExecutor;
use crate::handle::OpenSessionRegistry;
use crate::history::HistoryStrategy;
use crate::model::{SyncAction, SyncReport};
use crate::planner::SyncPlanner;
use crate::remote::RemoteSessionService;
use crate::store::LocalSessionStore;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Synchronizes the local session store with a remote project.
///
/// Each iteration snapshots both sides, plans, and executes. Actions skipped
/// because a session changed mid-pass are picked up by the next iteration,
/// up to [`SyncConfig::max_iterations`].
pub struct SessionSynchronizer<R, S, H> {
    remote: Arc<R>,
    store: Arc<S>,
    planner: SyncPlanner,
    executor: SyncExecutor<R, S, H>,
    open_sessions: Arc<OpenSessionRegistry>,
    config: SyncConfig,
}

impl<R, S, H> SessionSynchronizer<R, S, H>
where
    R: RemoteSessionService,
    S: LocalSessionStore,
    H: HistoryStrategy,
{
    /// Creates a synchronizer.
    pub fn new(
        remote: Arc<R>,
        store: Arc<S>,
        history: Arc<H>,
        open_sessions: Arc<OpenSessionRegistry>,
        config: SyncConfig,
    ) -> Self {
        let executor =
            SyncExecutor::with_config(Arc::clone(&remote), Arc::clone(&store), history, &config);
        Self {
            remote,
            store,
            planner: SyncPlanner::new(),
            executor,
            open_sessions,
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Plans one pass against current state without executing it.
    ///
    /// Fails if the remote listing or a local marker scan fails.
    pub fn plan_once(&self) -> EngineResult<Vec<SyncAction>> {
        let remote_sessions = self.remote.list_sessions(&self.config.remote_project)?;
        let local_sessions = self.store.cached_sessions();
        let tombstones = self.store.tombstones()?;
        let unreadable = self.store.unreadable_sessions()?;

        debug!(
            remote = remote_sessions.len(),
            local = local_sessions.len(),
            tombstones = tombstones.len(),
            unreadable = unreadable.len(),
            "planning sync pass"
        );
        Ok(self
            .planner
            .plan(&local_sessions, &remote_sessions, &tombstones, &unreadable))
    }

    /// Runs plan/execute passes until nothing is left to retry.
    ///
    /// Per-action failures are reported in the returned [`SyncReport`] and do
    /// not fail the call; they are retried by the next call.
    pub fn synchronize(&self) -> EngineResult<SyncReport> {
        let mut report = SyncReport::default();

        for iteration in 1..=self.config.max_iterations {
            report.iterations = iteration;
            let actions = self.plan_once()?;
            if actions.is_empty() {
                debug!(iteration, "nothing to synchronize");
                report.converged = true;
                return Ok(report);
            }

            let open = self.open_sessions.snapshot();
            let result = self
                .executor
                .execute(&actions, &open, &self.config.remote_project);
            info!(
                iteration,
                planned = actions.len(),
                succeeded = result.succeeded.len(),
                failed = result.failed.len(),
                skipped = result.skipped.len(),
                "sync pass finished"
            );

            let retry = !result.skipped.is_empty();
            report.results.push(result);
            if !retry {
                report.converged = true;
                return Ok(report);
            }
        }

        warn!(
            max_iterations = self.config.max_iterations,
            "sessions kept changing during sync, giving up until next call"
        );
        report.cap_reached = true;
        Ok(report)
    }
}
