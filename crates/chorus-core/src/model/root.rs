// ── Root snapshot ──

use std::sync::Arc;

use indexmap::IndexMap;
use serde::Serialize;

use chorus_sdk::{ConnectionStatus, EntityId};

use super::conversation::ConversationState;
use super::device::DeviceList;
use super::diagnostics::Diagnostics;

/// Ordered, id-keyed map of shared entries.
pub type EntryMap<T> = IndexMap<EntityId, Arc<T>>;

pub type ConversationMap = EntryMap<ConversationState>;

/// Most deletions remembered at once. The oldest tombstone is forgotten
/// first.
pub const TOMBSTONE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RealtimeConnection {
    pub status: ConnectionStatus,
    pub sequence: u64,
}

/// The single immutable snapshot of everything the client knows.
///
/// Each top-level section is behind an `Arc`. A commit that touches one
/// conversation rebuilds that conversation and the `conversations` map;
/// `devices`, `connection` and `diagnostics` keep their previous pointers.
/// Consumers compare sections with [`Arc::ptr_eq`] to detect change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RootState {
    /// Bumped by exactly one on every applied commit.
    pub version: u64,
    pub conversations: Arc<ConversationMap>,
    /// Deleted conversations and the sequence they were deleted at, in
    /// deletion order and bounded by [`TOMBSTONE_CAPACITY`].
    pub tombstones: Arc<IndexMap<EntityId, u64>>,
    pub devices: Arc<DeviceList>,
    pub connection: Arc<RealtimeConnection>,
    pub diagnostics: Arc<Diagnostics>,
}

impl RootState {
    pub fn conversation(&self, id: &EntityId) -> Option<&Arc<ConversationState>> {
        self.conversations.get(id)
    }

    /// Find the conversation currently holding message `message_id`.
    pub fn message_owner(&self, message_id: &EntityId) -> Option<&EntityId> {
        self.conversations
            .iter()
            .find(|(_, c)| c.messages.contains_key(message_id))
            .map(|(id, _)| id)
    }

    /// `true` if `id` was deleted at or after `sequence`.
    pub fn is_tombstoned(&self, id: &EntityId, sequence: u64) -> bool {
        self.tombstones.get(id).is_some_and(|at| sequence <= *at)
    }
}
