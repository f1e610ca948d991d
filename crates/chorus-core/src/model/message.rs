// ── Message domain types ──

use chrono::{DateTime, Utc};
use serde::Serialize;

use chorus_sdk::{EntityId, MessageKind, MessagePayload};

/// Lifecycle of a chat message.
///
/// Ordered by rank: a status only ever moves to a higher rank, except for
/// an explicit retry which resets `Failed` back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MessageStatus {
    /// Sent optimistically, no server acknowledgement yet.
    Pending,
    /// The send call failed; the caller may retry.
    Failed,
    /// Echoed back by the service.
    Confirmed,
    Delivered,
    Read,
}

impl MessageStatus {
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Failed => 1,
            Self::Confirmed => 2,
            Self::Delivered => 3,
            Self::Read => 4,
        }
    }

    /// `true` if moving from `self` to `next` is a forward transition.
    pub fn advances_to(self, next: Self) -> bool {
        next.rank() > self.rank()
    }

    /// The higher-ranked of the two.
    pub fn max(self, other: Self) -> Self {
        if other.rank() > self.rank() { other } else { self }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: EntityId,
    pub sender_id: Option<EntityId>,
    pub sender_display_name: Option<String>,
    pub content: String,
    pub kind: MessageKind,
    pub status: MessageStatus,
    /// Last service sequence applied to this message. Zero for local-only
    /// optimistic entries.
    pub sequence: u64,
    pub created_on: DateTime<Utc>,
    pub edited_on: Option<DateTime<Utc>>,
    pub deleted_on: Option<DateTime<Utc>>,
}

impl Message {
    /// Build an optimistic message that has not reached the service yet.
    pub fn pending(
        id: EntityId,
        sender_id: EntityId,
        sender_display_name: Option<String>,
        content: String,
        kind: MessageKind,
    ) -> Self {
        Self {
            id,
            sender_id: Some(sender_id),
            sender_display_name,
            content,
            kind,
            status: MessageStatus::Pending,
            sequence: 0,
            created_on: Utc::now(),
            edited_on: None,
            deleted_on: None,
        }
    }

    /// Build a message from a service payload.
    pub fn from_payload(payload: &MessagePayload, sequence: u64, status: MessageStatus) -> Self {
        Self {
            id: payload.id.clone(),
            sender_id: payload.sender_id.clone(),
            sender_display_name: payload.sender_display_name.clone(),
            content: payload.content.clone(),
            kind: payload.kind,
            status,
            sequence,
            created_on: payload.created_on,
            edited_on: None,
            deleted_on: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_on.is_some()
    }
}
