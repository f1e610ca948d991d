// ── Selector / binding layer ──
//
// A selector picks the shared slices of the root state a UI fragment
// reads and derives props from them. `Memoized` re-derives only when a
// slice is a different `Arc` than last time (or the arguments changed),
// which structural sharing makes a cheap and exact change test.

mod bindings;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::model::RootState;

pub use bindings::{
    Bindings, ComponentKey, DeviceOption, DevicePickerProps, DevicePickerSelector, ErrorBanner,
    ErrorBarProps, ErrorBarSelector, MessageThreadProps, MessageThreadSelector, MessageView,
    ParticipantListProps, ParticipantListSelector, ParticipantView, Props, SendBoxProps,
    SendBoxSelector, ThreadListProps, ThreadListSelector, ThreadSummary, TypingIndicatorProps,
    TypingIndicatorSelector,
};

// ── Slice identity ───────────────────────────────────────────────────

/// Identity comparison for selector inputs.
pub trait SliceKey {
    /// `true` if `self` and `other` refer to the same data.
    fn same(&self, other: &Self) -> bool;
}

impl<T: ?Sized> SliceKey for Arc<T> {
    fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: SliceKey> SliceKey for Option<T> {
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl SliceKey for () {
    fn same(&self, _other: &Self) -> bool {
        true
    }
}

impl<A: SliceKey, B: SliceKey> SliceKey for (A, B) {
    fn same(&self, other: &Self) -> bool {
        self.0.same(&other.0) && self.1.same(&other.1)
    }
}

impl<A: SliceKey, B: SliceKey, C: SliceKey> SliceKey for (A, B, C) {
    fn same(&self, other: &Self) -> bool {
        self.0.same(&other.0) && self.1.same(&other.1) && self.2.same(&other.2)
    }
}

// ── Selector ─────────────────────────────────────────────────────────

/// Derives props for one UI fragment from the root state.
pub trait Selector: Send + Sync {
    type Args: Clone + PartialEq + Send + Sync;
    type Slices: SliceKey + Send + Sync;
    type Props: Send + Sync;

    /// Pick the slices this selector depends on. Must be cheap.
    fn slices(&self, state: &RootState, args: &Self::Args) -> Self::Slices;

    /// Build props from the picked slices. Must be pure.
    fn derive(&self, slices: &Self::Slices, args: &Self::Args) -> Self::Props;
}

struct Cached<S: Selector> {
    args: S::Args,
    slices: S::Slices,
    props: Arc<S::Props>,
}

/// Single-slot memoization around a [`Selector`].
///
/// Returns the previous `Arc<Props>` (same pointer) when neither the
/// slices nor the arguments changed since the last call.
pub struct Memoized<S: Selector> {
    selector: S,
    last: Mutex<Option<Cached<S>>>,
    computations: AtomicUsize,
}

impl<S: Selector> Memoized<S> {
    pub fn new(selector: S) -> Self {
        Self {
            selector,
            last: Mutex::new(None),
            computations: AtomicUsize::new(0),
        }
    }

    pub fn select(&self, state: &RootState, args: &S::Args) -> Arc<S::Props> {
        let slices = self.selector.slices(state, args);
        let mut last = self.last.lock();
        if let Some(cached) = last.as_ref() {
            if cached.args == *args && cached.slices.same(&slices) {
                return Arc::clone(&cached.props);
            }
        }
        let props = Arc::new(self.selector.derive(&slices, args));
        self.computations.fetch_add(1, Ordering::Relaxed);
        *last = Some(Cached {
            args: args.clone(),
            slices,
            props: Arc::clone(&props),
        });
        props
    }

    /// How many times `derive` has run.
    pub fn computations(&self) -> usize {
        self.computations.load(Ordering::Relaxed)
    }

    /// Forget the cached props.
    pub fn reset(&self) {
        *self.last.lock() = None;
    }
}
