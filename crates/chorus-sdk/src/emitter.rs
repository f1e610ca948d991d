//! Listener registry with the SDK's `on` / `off` semantics.
//!
//! Listeners are keyed by [`EventKind`] and deduplicated by reference:
//! registering the same `Arc` twice for one kind keeps a single entry,
//! and `off` only removes that exact `Arc`. Emission works on a snapshot
//! of the listener list, so a listener may call `on`/`off` from inside
//! its own callback; the change applies from the next emission onward.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::{error, trace};

use crate::event::{EventKind, SdkEvent};

/// A callback attached to the event feed.
pub type Listener = Arc<dyn Fn(&SdkEvent) + Send + Sync>;

#[derive(Default)]
pub struct EventEmitter {
    listeners: Mutex<IndexMap<EventKind, Vec<Listener>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `listener` for `kind`. Returns `false` if this exact
    /// listener was already attached for that kind.
    pub fn on(&self, kind: EventKind, listener: Listener) -> bool {
        let mut map = self.listeners.lock();
        let slot = map.entry(kind).or_default();
        if slot.iter().any(|l| Arc::ptr_eq(l, &listener)) {
            trace!(%kind, "listener already attached");
            return false;
        }
        slot.push(listener);
        true
    }

    /// Detach `listener` for `kind`. Returns `false` if it was not attached.
    pub fn off(&self, kind: EventKind, listener: &Listener) -> bool {
        let mut map = self.listeners.lock();
        let Some(slot) = map.get_mut(&kind) else {
            return false;
        };
        let before = slot.len();
        slot.retain(|l| !Arc::ptr_eq(l, listener));
        before != slot.len()
    }

    /// Invoke every listener attached for the event's kind, in attach order.
    ///
    /// A panicking listener is logged and skipped; the rest still run.
    /// Returns the number of listeners invoked.
    pub fn emit(&self, event: &SdkEvent) -> usize {
        let kind = event.kind();
        let snapshot: Vec<Listener> = self
            .listeners
            .lock()
            .get(&kind)
            .cloned()
            .unwrap_or_default();

        for listener in &snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_err() {
                error!(%kind, "event listener panicked");
            }
        }
        snapshot.len()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.listeners.lock().get(&kind).map_or(0, Vec::len)
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.lock().values().map(Vec::len).sum()
    }

    /// Detach everything. Returns how many listeners were removed.
    pub fn clear(&self) -> usize {
        let mut map = self.listeners.lock();
        let removed = map.values().map(Vec::len).sum();
        map.clear();
        removed
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.total_listeners())
            .finish()
    }
}
