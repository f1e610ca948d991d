// ── Handle cache ──
//
// At most one live handle per entity id. Creation goes through the
// `DashMap` entry API, so concurrent lookups for the same id race on the
// shard lock and exactly one factory call wins.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use chorus_sdk::EntityId;

/// Something that owns resources (listener registrations, cached
/// selectors) and must release them explicitly.
pub trait Handle: Send + Sync {
    /// Release everything this handle holds. Must be idempotent.
    fn dispose(&self);
}

pub struct HandleCache<H: Handle> {
    handles: DashMap<EntityId, Arc<H>>,
}

impl<H: Handle> Default for HandleCache<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Handle> HandleCache<H> {
    pub fn new() -> Self {
        Self {
            handles: DashMap::new(),
        }
    }

    /// Return the cached handle for `id`, building it with `factory` on
    /// first use. Every later call returns the same `Arc`.
    pub fn get_or_create<F>(&self, id: &EntityId, factory: F) -> Arc<H>
    where
        F: FnOnce() -> H,
    {
        if let Some(existing) = self.handles.get(id) {
            return Arc::clone(existing.value());
        }
        match self.handles.entry(id.clone()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                debug!(%id, "handle created");
                Arc::clone(entry.insert(Arc::new(factory())).value())
            }
        }
    }

    pub fn get(&self, id: &EntityId) -> Option<Arc<H>> {
        self.handles.get(id).map(|h| Arc::clone(h.value()))
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.handles.contains_key(id)
    }

    /// Remove and dispose the handle for `id`. Returns `true` if one existed.
    pub fn evict(&self, id: &EntityId) -> bool {
        // Dispose outside the shard lock: handles may call back into caches.
        let Some((_, handle)) = self.handles.remove(id) else {
            return false;
        };
        handle.dispose();
        debug!(%id, "handle evicted");
        true
    }

    /// Dispose and drop every handle. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let ids: Vec<EntityId> = self.handles.iter().map(|e| e.key().clone()).collect();
        ids.iter().filter(|id| self.evict(id)).count()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<H: Handle> std::fmt::Debug for HandleCache<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleCache")
            .field("handles", &self.len())
            .finish()
    }
}
