// ── Subscription registry ──
//
// Synchronous fan-out of committed snapshots to state-change handlers.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, trace};

use crate::model::RootState;

/// Callback invoked once per applied commit with the new snapshot.
pub type StateHandler = Arc<dyn Fn(&Arc<RootState>) + Send + Sync>;

/// Ordered set of [`StateHandler`]s, deduplicated by `Arc` identity.
///
/// Notification iterates a copy of the handler list, so handlers may
/// register or unregister (themselves included) while being notified. The
/// change applies from the next commit.
#[derive(Default)]
pub struct SubscriptionRegistry {
    handlers: Mutex<Vec<StateHandler>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if this exact handler is already registered.
    pub fn register(&self, handler: StateHandler) -> bool {
        let mut handlers = self.handlers.lock();
        if handlers.iter().any(|h| Arc::ptr_eq(h, &handler)) {
            trace!("state handler already registered");
            return false;
        }
        handlers.push(handler);
        true
    }

    /// Returns `false` if the handler was not registered.
    pub fn unregister(&self, handler: &StateHandler) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|h| !Arc::ptr_eq(h, handler));
        before != handlers.len()
    }

    /// Run every handler once, in registration order. Returns how many ran.
    pub fn notify(&self, state: &Arc<RootState>) -> usize {
        let snapshot: Vec<StateHandler> = self.handlers.lock().clone();
        for handler in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| handler(state))).is_err() {
                error!(version = state.version, "state handler panicked");
            }
        }
        snapshot.len()
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    /// Drop every handler. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let mut handlers = self.handlers.lock();
        let removed = handlers.len();
        handlers.clear();
        removed
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn handlers_run_in_registration_order() {
        let registry = SubscriptionRegistry::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            let log = Arc::clone(&log);
            registry.register(Arc::new(move |_| log.lock().push(name)));
        }

        registry.notify(&Arc::new(RootState::default()));
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let handler: StateHandler = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(registry.register(Arc::clone(&handler)));
        assert!(!registry.register(Arc::clone(&handler)));
        registry.notify(&Arc::new(RootState::default()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        assert!(registry.unregister(&handler));
        assert!(!registry.unregister(&handler));
        assert!(registry.is_empty());
    }

    #[test]
    fn panicking_handler_does_not_block_the_rest() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        registry.register(Arc::new(|_| panic!("handler bug")));
        registry.register(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(registry.notify(&Arc::new(RootState::default())), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
