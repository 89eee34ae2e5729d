//! Per-key serial task execution.
//!
//! Every session id gets its own FIFO queue drained by one lightweight worker
//! task, so at most one task touches a given session at a time while tasks
//! for different sessions run in parallel. A queue is dropped as soon as its
//! worker finds it empty; idle keys cost nothing.
//!
//! ```rust,ignore
//! let executor = KeyedExecutor::new(&ExecutorConfig::default())?;
//! let handle = executor.submit(session_id, move || write_archive(session_id));
//! handle.wait()??;
//! ```
//!
//! Tasks must not wait on a handle for their own key: the queue is serial,
//! so such a wait never completes.

use crate::config::ExecutorConfig;
use crate::error::{EngineResult, SyncError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::{mpsc, oneshot};
use tracing::{trace, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;
type Queues<K> = Arc<Mutex<HashMap<K, mpsc::UnboundedSender<Job>>>>;

/// Runs submitted tasks serially per key and concurrently across keys.
pub struct KeyedExecutor<K> {
    runtime: Runtime,
    queues: Queues<K>,
}

impl<K> KeyedExecutor<K>
where
    K: Eq + Hash + Clone + Debug + Send + 'static,
{
    /// Creates an executor with its own worker threads.
    ///
    /// The executor must be dropped outside of any async context.
    pub fn new(config: &ExecutorConfig) -> EngineResult<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .max_blocking_threads(config.max_blocking_threads)
            .thread_name(config.thread_name.clone())
            .build()?;

        Ok(Self {
            runtime,
            queues: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Queues `task` behind every task already submitted for `key`.
    pub fn submit<F, T>(&self, key: K, task: F) -> TaskHandle<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            // The caller may have dropped its handle.
            let _ = result_tx.send(task());
        });
        let handle = TaskHandle {
            key: format!("{key:?}"),
            receiver: result_rx,
        };

        let mut queues = self.queues.lock();
        let job = match queues.get(&key) {
            Some(sender) => match sender.send(job) {
                Ok(()) => return handle,
                // Worker is gone; start a fresh queue below.
                Err(mpsc::error::SendError(job)) => job,
            },
            None => job,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let _ = sender.send(job);
        queues.insert(key.clone(), sender.clone());
        drop(queues);

        trace!(key = ?key, "starting session queue");
        self.runtime
            .spawn(drain_queue(key, sender, receiver, Arc::clone(&self.queues)));
        handle
    }

    /// Submits `task` and blocks until it has run.
    pub fn run<F, T>(&self, key: K, task: F) -> EngineResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit(key, task).wait()
    }

    /// Number of keys that currently have a live queue.
    pub fn active_keys(&self) -> usize {
        self.queues.lock().len()
    }
}

impl<K> Debug for KeyedExecutor<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedExecutor")
            .field("active_keys", &self.queues.lock().len())
            .finish()
    }
}

async fn drain_queue<K>(
    key: K,
    sender: mpsc::UnboundedSender<Job>,
    mut receiver: mpsc::UnboundedReceiver<Job>,
    queues: Queues<K>,
) where
    K: Eq + Hash + Debug + Send + 'static,
{
    while let Some(job) = receiver.recv().await {
        if let Err(e) = tokio::task::spawn_blocking(job).await {
            warn!(key = ?key, error = %e, "session task panicked");
        }

        // Submitters enqueue under the same lock, so an empty queue seen here
        // stays empty until the entry is gone.
        let idle = {
            let mut map = queues.lock();
            let idle = receiver.is_empty();
            if idle && map.get(&key).is_some_and(|s| s.same_channel(&sender)) {
                map.remove(&key);
            }
            idle
        };
        if idle {
            trace!(key = ?key, "session queue drained");
            break;
        }
    }
}

/// Handle to the result of a submitted task.
#[derive(Debug)]
pub struct TaskHandle<T> {
    key: String,
    receiver: oneshot::Receiver<T>,
}

impl<T> TaskHandle<T> {
    /// Blocks until the task has run and returns its value.
    ///
    /// Returns [`SyncError::TaskAborted`] if the task panicked or the
    /// executor shut down before running it. Must not be called from an
    /// async context.
    pub fn wait(self) -> EngineResult<T> {
        let key = self.key;
        self.receiver
            .blocking_recv()
            .map_err(|_| SyncError::TaskAborted(key))
    }
}
