// ── Versioned state store ──
//
// Holds the current `RootState` snapshot and serializes every mutation
// through one commit queue. Readers clone an `Arc` out of a `watch`
// channel and never block writers for longer than that clone.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, trace};

use super::instruction::Instruction;
use super::registry::{StateHandler, SubscriptionRegistry};
use crate::model::RootState;
use crate::stream::StateStream;

#[derive(Default)]
struct CommitQueue {
    pending: VecDeque<Instruction>,
    /// Set while some caller is applying queued instructions.
    draining: bool,
}

/// Single source of truth for the client's state.
///
/// `commit` is not reentrant: an instruction committed from inside a
/// state handler (or concurrently from another thread) is queued and
/// applied by whichever caller is already draining, after the current
/// instruction's handlers have returned.
pub struct StateStore {
    snapshot: watch::Sender<Arc<RootState>>,
    queue: Mutex<CommitQueue>,
    registry: SubscriptionRegistry,
    closed: AtomicBool,
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(RootState::default()));
        Self {
            snapshot,
            queue: Mutex::new(CommitQueue::default()),
            registry: SubscriptionRegistry::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Current snapshot.
    pub fn get_state(&self) -> Arc<RootState> {
        self.snapshot.borrow().clone()
    }

    /// Queue `instruction` and apply everything pending unless another
    /// caller is already doing so. Returns the latest snapshot.
    pub fn commit(&self, instruction: Instruction) -> Arc<RootState> {
        if self.is_closed() {
            trace!("store closed, commit ignored");
            return self.get_state();
        }
        {
            let mut queue = self.queue.lock();
            queue.pending.push_back(instruction);
            if queue.draining {
                trace!(queued = queue.pending.len(), "commit deferred");
                return self.get_state();
            }
            queue.draining = true;
        }
        self.drain();
        self.get_state()
    }

    fn drain(&self) {
        loop {
            let next = {
                let mut queue = self.queue.lock();
                if let Some(next) = queue.pending.pop_front() {
                    next
                } else {
                    queue.draining = false;
                    return;
                }
            };
            if self.is_closed() {
                continue;
            }

            let current = self.get_state();
            let Some(applied) = current.apply(&next) else {
                trace!(version = current.version, "instruction was a no-op");
                continue;
            };
            let applied = Arc::new(applied);
            debug!(version = applied.version, "state committed");
            self.snapshot.send_replace(Arc::clone(&applied));
            self.registry.notify(&applied);
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn on_state_change(&self, handler: StateHandler) -> bool {
        self.registry.register(handler)
    }

    pub fn off_state_change(&self, handler: &StateHandler) -> bool {
        self.registry.unregister(handler)
    }

    pub fn handler_count(&self) -> usize {
        self.registry.len()
    }

    /// Async view over the same snapshots the handlers see.
    pub fn subscribe(&self) -> StateStream {
        StateStream::new(self.snapshot.subscribe())
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Stop accepting commits and drop every handler. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.queue.lock().pending.clear();
        let dropped = self.registry.clear();
        debug!(handlers = dropped, "state store closed");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("version", &self.get_state().version)
            .field("handlers", &self.registry.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Weak;

    use chorus_sdk::{ConnectionStatus, EntityId};

    use super::*;
    use crate::model::ConversationKind;

    fn connect(sequence: u64) -> Instruction {
        Instruction::SetConnection {
            status: ConnectionStatus::Connected,
            sequence: Some(sequence),
        }
    }

    fn create(name: &str) -> Instruction {
        Instruction::UpsertConversation {
            id: EntityId::from(name),
            kind: ConversationKind::Chat,
            topic: None,
            created_on: None,
            sequence: 1,
        }
    }

    #[test]
    fn no_op_commit_does_not_notify() {
        let store = StateStore::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        store.on_state_change(Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let first = store.commit(connect(1));
        let second = store.commit(connect(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.get_state().version, 1);
    }

    #[test]
    fn reentrant_commit_runs_after_current_handlers() {
        let store = Arc::new(StateStore::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let weak: Weak<StateStore> = Arc::downgrade(&store);
        let log = Arc::clone(&seen);
        store.on_state_change(Arc::new(move |state| {
            log.lock().push(("first", state.version));
            if state.version == 1 {
                if let Some(store) = weak.upgrade() {
                    let returned = store.commit(create("nested"));
                    // Deferred: the nested instruction has not been applied yet.
                    assert_eq!(returned.version, 1);
                }
            }
        }));
        let log = Arc::clone(&seen);
        store.on_state_change(Arc::new(move |state| {
            log.lock().push(("second", state.version));
        }));

        let after = store.commit(connect(1));
        assert_eq!(after.version, 2);
        assert_eq!(
            *seen.lock(),
            vec![("first", 1), ("second", 1), ("first", 2), ("second", 2)]
        );
        assert!(after.conversation(&EntityId::from("nested")).is_some());
    }

    #[test]
    fn closed_store_ignores_commits() {
        let store = StateStore::new();
        store.on_state_change(Arc::new(|_| {}));
        store.close();
        store.close();

        let state = store.commit(connect(1));
        assert_eq!(state.version, 0);
        assert_eq!(store.handler_count(), 0);
    }

    #[tokio::test]
    async fn subscribers_observe_committed_snapshots() {
        let store = StateStore::new();
        let mut stream = store.subscribe();
        assert_eq!(stream.current().version, 0);

        store.commit(connect(1));
        let next = stream.changed().await.unwrap();
        assert_eq!(next.version, 1);
        assert!(Arc::ptr_eq(&next, &store.get_state()));
    }
}
