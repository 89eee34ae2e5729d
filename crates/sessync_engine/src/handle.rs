//! Hooks into sessions the application currently has open.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// A live editing context showing one session.
///
/// Both calls are notifications: implementations must return promptly and
/// must not wait on session executor tasks for the same session.
pub trait SessionHandle: Send + Sync {
    /// The session changed on disk; reload it.
    fn reload(&self);

    /// The session was deleted; switch to a fresh default session.
    fn open_default_session(&self);
}

/// Snapshot of open sessions passed to the executor.
pub type OpenSessions = HashMap<Uuid, Arc<dyn SessionHandle>>;

/// Registry of sessions open in the application.
#[derive(Default)]
pub struct OpenSessionRegistry {
    handles: RwLock<OpenSessions>,
}

impl OpenSessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handle showing `session_id`, replacing any previous one.
    pub fn register(&self, session_id: Uuid, handle: Arc<dyn SessionHandle>) {
        self.handles.write().insert(session_id, handle);
    }

    /// Removes the handle for `session_id`.
    pub fn unregister(&self, session_id: Uuid) -> Option<Arc<dyn SessionHandle>> {
        self.handles.write().remove(&session_id)
    }

    /// Copies the current handles.
    pub fn snapshot(&self) -> OpenSessions {
        self.handles.read().clone()
    }

    /// Number of registered sessions.
    pub fn len(&self) -> usize {
        self.handles.read().len()
    }

    /// Returns true if no session is registered.
    pub fn is_empty(&self) -> bool {
        self.handles.read().is_empty()
    }
}

impl fmt::Debug for OpenSessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenSessionRegistry")
            .field("sessions", &self.handles.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        reloads: AtomicUsize,
    }

    impl SessionHandle for Counting {
        fn reload(&self) {
            self.reloads.fetch_add(1, Ordering::SeqCst);
        }

        fn open_default_session(&self) {}
    }

    #[test]
    fn snapshot_is_detached() {
        let registry = OpenSessionRegistry::new();
        let id = Uuid::new_v4();
        let handle = Arc::new(Counting::default());
        registry.register(id, handle.clone());

        let snapshot = registry.snapshot();
        registry.unregister(id);

        assert!(registry.is_empty());
        snapshot[&id].reload();
        assert_eq!(handle.reloads.load(Ordering::SeqCst), 1);
    }
}
