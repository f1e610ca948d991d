// ── State mutation instructions ──
//
// Every change to the root state is described as data first and applied
// by `RootState::apply`. Sequence-carrying variants come from the SDK event
// feed or from authoritative SDK results; `None` sequences are local
// optimistic changes that never move a sequence counter.

use chrono::{DateTime, Utc};

use chorus_sdk::{ConnectionStatus, DeviceInfo, EntityId, MessagePayload, ParticipantPayload};

use crate::model::{
    ConversationKind, ConversationStatus, DiagnosticError, Message, MessageStatus,
    OperationCategory,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // ── Conversations ────────────────────────────────────────────────
    UpsertConversation {
        id: EntityId,
        kind: ConversationKind,
        topic: Option<String>,
        created_on: Option<DateTime<Utc>>,
        sequence: u64,
    },
    /// Drop a conversation and tombstone its id at `sequence`.
    RemoveConversation { id: EntityId, sequence: u64 },
    /// `sequence: None` marks a local, already acknowledged update.
    UpdateTopic {
        conversation_id: EntityId,
        topic: Option<String>,
        sequence: Option<u64>,
    },
    SetConversationStatus {
        conversation_id: EntityId,
        kind: ConversationKind,
        status: ConversationStatus,
        sequence: Option<u64>,
    },

    // ── Messages ─────────────────────────────────────────────────────
    /// Insert an optimistic local message.
    AddPendingMessage {
        conversation_id: EntityId,
        message: Message,
    },
    /// `Pending` → `Failed`.
    FailMessage {
        conversation_id: EntityId,
        message_id: EntityId,
    },
    /// `Failed` → `Pending`.
    RetryMessage {
        conversation_id: EntityId,
        message_id: EntityId,
    },
    /// Insert or confirm a service-side message. Never lowers the status of
    /// an existing entry below `status`.
    UpsertMessage {
        conversation_id: EntityId,
        message: MessagePayload,
        status: MessageStatus,
        sequence: u64,
    },
    AdvanceMessageStatus {
        conversation_id: EntityId,
        message_id: EntityId,
        status: MessageStatus,
        sequence: u64,
    },
    EditMessage {
        conversation_id: EntityId,
        message_id: EntityId,
        content: String,
        edited_on: DateTime<Utc>,
        sequence: u64,
    },
    DeleteMessage {
        conversation_id: EntityId,
        message_id: EntityId,
        deleted_on: DateTime<Utc>,
        sequence: u64,
    },

    // ── Participants / typing ────────────────────────────────────────
    UpsertParticipant {
        conversation_id: EntityId,
        participant: ParticipantPayload,
        sequence: u64,
    },
    RemoveParticipant {
        conversation_id: EntityId,
        participant_id: EntityId,
        sequence: u64,
    },
    SetTyping {
        conversation_id: EntityId,
        participant_id: EntityId,
        received_on: DateTime<Utc>,
        sequence: u64,
    },
    /// Drop every typing indicator received before `older_than`.
    ExpireTyping { older_than: DateTime<Utc> },

    // ── Session-wide sections ────────────────────────────────────────
    SetConnection {
        status: ConnectionStatus,
        sequence: Option<u64>,
    },
    ReplaceDevices {
        devices: Vec<DeviceInfo>,
        sequence: Option<u64>,
    },
    RecordError {
        category: OperationCategory,
        error: DiagnosticError,
    },
    ClearError { category: OperationCategory },

    /// Apply several instructions as one commit. Inner no-ops are skipped;
    /// the batch is a no-op only if all of them are.
    Batch(Vec<Instruction>),
}

impl Instruction {
    /// Conversation this instruction is scoped to, if any.
    pub fn conversation_id(&self) -> Option<&EntityId> {
        match self {
            Self::UpsertConversation { id, .. } | Self::RemoveConversation { id, .. } => Some(id),
            Self::UpdateTopic {
                conversation_id, ..
            }
            | Self::SetConversationStatus {
                conversation_id, ..
            }
            | Self::AddPendingMessage {
                conversation_id, ..
            }
            | Self::FailMessage {
                conversation_id, ..
            }
            | Self::RetryMessage {
                conversation_id, ..
            }
            | Self::UpsertMessage {
                conversation_id, ..
            }
            | Self::AdvanceMessageStatus {
                conversation_id, ..
            }
            | Self::EditMessage {
                conversation_id, ..
            }
            | Self::DeleteMessage {
                conversation_id, ..
            }
            | Self::UpsertParticipant {
                conversation_id, ..
            }
            | Self::RemoveParticipant {
                conversation_id, ..
            }
            | Self::SetTyping {
                conversation_id, ..
            } => Some(conversation_id),
            Self::ExpireTyping { .. }
            | Self::SetConnection { .. }
            | Self::ReplaceDevices { .. }
            | Self::RecordError { .. }
            | Self::ClearError { .. }
            | Self::Batch(_) => None,
        }
    }
}
