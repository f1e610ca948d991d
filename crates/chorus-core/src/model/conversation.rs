// ── Conversation (thread or call) ──

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use chorus_sdk::{CallStatus, EntityId};

use super::message::Message;
use super::participant::Participant;
use super::root::EntryMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ConversationKind {
    Chat,
    Call,
}

/// Connection / call state of a conversation. Chat threads stay `Idle`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ConversationStatus {
    #[default]
    Idle,
    Connecting,
    Connected,
    OnHold,
    Disconnecting,
    Disconnected,
}

impl From<CallStatus> for ConversationStatus {
    fn from(status: CallStatus) -> Self {
        match status {
            CallStatus::Connecting | CallStatus::Ringing => Self::Connecting,
            CallStatus::Connected => Self::Connected,
            CallStatus::LocalHold => Self::OnHold,
            CallStatus::Disconnecting => Self::Disconnecting,
            CallStatus::Disconnected => Self::Disconnected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypingIndicator {
    pub participant_id: EntityId,
    pub received_on: DateTime<Utc>,
    pub sequence: u64,
}

/// One chat thread or call.
///
/// Cloning is cheap: the entry maps are behind `Arc`s and are only
/// copied when a commit writes to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationState {
    pub id: EntityId,
    pub kind: ConversationKind,
    pub topic: Option<String>,
    pub status: ConversationStatus,
    pub created_on: Option<DateTime<Utc>>,
    /// Last sequence applied to thread-level metadata (topic, status).
    pub sequence: u64,
    pub messages: Arc<EntryMap<Message>>,
    pub participants: Arc<EntryMap<Participant>>,
    pub typing: Arc<EntryMap<TypingIndicator>>,
}

impl ConversationState {
    pub fn new(id: EntityId, kind: ConversationKind) -> Self {
        Self {
            id,
            kind,
            topic: None,
            status: ConversationStatus::default(),
            created_on: None,
            sequence: 0,
            messages: Arc::default(),
            participants: Arc::default(),
            typing: Arc::default(),
        }
    }

    pub fn message(&self, id: &EntityId) -> Option<&Arc<Message>> {
        self.messages.get(id)
    }

    pub fn participant(&self, id: &EntityId) -> Option<&Arc<Participant>> {
        self.participants.get(id)
    }

    /// Number of entries (messages and participants) held.
    pub fn entry_count(&self) -> usize {
        self.messages.len() + self.participants.len()
    }

    // ── Copy-on-write helpers ────────────────────────────────────────

    pub(crate) fn with_message(&self, message: Message) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.messages).insert(message.id.clone(), Arc::new(message));
        next
    }

    pub(crate) fn with_participant(&self, participant: Participant) -> Self {
        let mut next = self.clone();
        let id = participant.id.clone();
        Arc::make_mut(&mut next.participants).insert(id.clone(), Arc::new(participant));
        if next.typing.contains_key(&id)
            && next
                .participants
                .get(&id)
                .is_some_and(|p| !p.status.is_present())
        {
            Arc::make_mut(&mut next.typing).shift_remove(&id);
        }
        next
    }

    pub(crate) fn with_typing(&self, indicator: TypingIndicator) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.typing)
            .insert(indicator.participant_id.clone(), Arc::new(indicator));
        next
    }

    /// Drop typing indicators received before `cutoff`. `None` if nothing expired.
    pub(crate) fn without_typing_before(&self, cutoff: DateTime<Utc>) -> Option<Self> {
        if !self.typing.values().any(|t| t.received_on < cutoff) {
            return None;
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.typing).retain(|_, t| t.received_on >= cutoff);
        Some(next)
    }
}
