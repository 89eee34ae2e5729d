//! Configuration for the sync engine.

/// Default cap on plan/execute iterations per `synchronize()` call.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Configuration for the convergence loop.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Remote project whose sessions are synchronized.
    pub remote_project: String,
    /// Maximum number of plan/execute iterations per call.
    ///
    /// Bounds the work done when local sessions keep changing under the
    /// loop; reaching it is not an error.
    pub max_iterations: u32,
    /// Fetch remote content before an upload so both sides can be merged.
    pub merge_before_upload: bool,
}

impl SyncConfig {
    /// Creates a new sync configuration for a remote project.
    pub fn new(remote_project: impl Into<String>) -> Self {
        Self {
            remote_project: remote_project.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            merge_before_upload: true,
        }
    }

    /// Sets the iteration cap. Zero is raised to one.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// Enables or disables the pre-upload merge fetch.
    pub fn with_merge_before_upload(mut self, enabled: bool) -> Self {
        self.merge_before_upload = enabled;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("")
    }
}

/// Configuration for the per-session serial executor.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Number of async worker threads driving the per-key queues.
    pub worker_threads: usize,
    /// Upper bound on threads running session I/O concurrently.
    pub max_blocking_threads: usize,
    /// Name given to executor threads.
    pub thread_name: String,
}

impl ExecutorConfig {
    /// Creates a configuration with the given worker thread count.
    pub fn new(worker_threads: usize) -> Self {
        Self {
            worker_threads: worker_threads.max(1),
            max_blocking_threads: 16,
            thread_name: "session-io".into(),
        }
    }

    /// Sets the blocking thread limit.
    pub fn with_max_blocking_threads(mut self, threads: usize) -> Self {
        self.max_blocking_threads = threads.max(1);
        self
    }

    /// Sets the thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self::new(2)
    }
}
