//! Typed event feed emitted by the session SDK.
//!
//! Every event carries the id of the entity it concerns and a monotonic
//! `sequence` assigned by the service. Sequences grow per conversation;
//! device-list and connection events use their own section-wide counters.
//! Consumers compare sequences to drop duplicates and stale deliveries.
//!
//! The wire shape is `{ "kind": "messageReceived", "threadId": ..., ... }`.
//! Unrecognised kinds deserialize to [`SdkEvent::Unknown`] instead of
//! failing, so newer services never break older clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

use crate::id::EntityId;
use crate::types::{DeviceInfo, MessageKind};

// ── Event kind ───────────────────────────────────────────────────────

/// Discriminant used to register listeners for one kind of event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, AsRefStr,
)]
#[strum(serialize_all = "camelCase")]
pub enum EventKind {
    MessageReceived,
    MessageDelivered,
    ReadReceiptReceived,
    MessageEdited,
    MessageDeleted,
    ParticipantAdded,
    ParticipantRemoved,
    TypingIndicatorReceived,
    ThreadCreated,
    ThreadDeleted,
    ThreadPropertiesUpdated,
    CallStateChanged,
    ConnectionStateChanged,
    DeviceListChanged,
    Unknown,
}

// ── Payloads ─────────────────────────────────────────────────────────

/// A chat message as delivered by the service.
///
/// For messages sent by this client, `id` is the client-generated id
/// passed in [`SendMessageRequest`](crate::SendMessageRequest), echoed back
/// unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub id: EntityId,
    #[serde(default)]
    pub sender_id: Option<EntityId>,
    #[serde(default)]
    pub sender_display_name: Option<String>,
    pub content: String,
    #[serde(default)]
    pub kind: MessageKind,
    pub created_on: DateTime<Utc>,
}

/// Presence reported when a participant is added.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PresenceState {
    /// Still being admitted (calls only).
    Joining,
    #[default]
    Connected,
}

/// A thread or call participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantPayload {
    pub id: EntityId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub presence: PresenceState,
}

/// Device payloads share the enumeration shape.
pub type DevicePayload = DeviceInfo;

/// Call state reported by the calling half of the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CallStatus {
    Connecting,
    Ringing,
    Connected,
    LocalHold,
    Disconnecting,
    Disconnected,
}

/// State of the realtime notification channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

// ── SdkEvent ─────────────────────────────────────────────────────────

/// A single notification from the SDK's event feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SdkEvent {
    MessageReceived {
        thread_id: EntityId,
        message: MessagePayload,
        sequence: u64,
    },
    MessageDelivered {
        thread_id: EntityId,
        message_id: EntityId,
        sequence: u64,
    },
    ReadReceiptReceived {
        thread_id: EntityId,
        message_id: EntityId,
        reader_id: EntityId,
        sequence: u64,
    },
    MessageEdited {
        thread_id: EntityId,
        message_id: EntityId,
        content: String,
        edited_on: DateTime<Utc>,
        sequence: u64,
    },
    MessageDeleted {
        thread_id: EntityId,
        message_id: EntityId,
        deleted_on: DateTime<Utc>,
        sequence: u64,
    },
    ParticipantAdded {
        thread_id: EntityId,
        participant: ParticipantPayload,
        sequence: u64,
    },
    ParticipantRemoved {
        thread_id: EntityId,
        participant_id: EntityId,
        sequence: u64,
    },
    TypingIndicatorReceived {
        thread_id: EntityId,
        sender_id: EntityId,
        received_on: DateTime<Utc>,
        sequence: u64,
    },
    ThreadCreated {
        thread_id: EntityId,
        #[serde(default)]
        topic: Option<String>,
        #[serde(default)]
        created_on: Option<DateTime<Utc>>,
        sequence: u64,
    },
    ThreadDeleted {
        thread_id: EntityId,
        sequence: u64,
    },
    ThreadPropertiesUpdated {
        thread_id: EntityId,
        #[serde(default)]
        topic: Option<String>,
        sequence: u64,
    },
    CallStateChanged {
        call_id: EntityId,
        status: CallStatus,
        sequence: u64,
    },
    ConnectionStateChanged {
        status: ConnectionStatus,
        sequence: u64,
    },
    DeviceListChanged {
        devices: Vec<DevicePayload>,
        sequence: u64,
    },
    /// Any kind this version of the contract does not know about.
    #[serde(other)]
    Unknown,
}

impl SdkEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MessageReceived { .. } => EventKind::MessageReceived,
            Self::MessageDelivered { .. } => EventKind::MessageDelivered,
            Self::ReadReceiptReceived { .. } => EventKind::ReadReceiptReceived,
            Self::MessageEdited { .. } => EventKind::MessageEdited,
            Self::MessageDeleted { .. } => EventKind::MessageDeleted,
            Self::ParticipantAdded { .. } => EventKind::ParticipantAdded,
            Self::ParticipantRemoved { .. } => EventKind::ParticipantRemoved,
            Self::TypingIndicatorReceived { .. } => EventKind::TypingIndicatorReceived,
            Self::ThreadCreated { .. } => EventKind::ThreadCreated,
            Self::ThreadDeleted { .. } => EventKind::ThreadDeleted,
            Self::ThreadPropertiesUpdated { .. } => EventKind::ThreadPropertiesUpdated,
            Self::CallStateChanged { .. } => EventKind::CallStateChanged,
            Self::ConnectionStateChanged { .. } => EventKind::ConnectionStateChanged,
            Self::DeviceListChanged { .. } => EventKind::DeviceListChanged,
            Self::Unknown => EventKind::Unknown,
        }
    }

    /// The service-assigned ordering sequence, if the event carries one.
    pub fn sequence(&self) -> Option<u64> {
        match self {
            Self::MessageReceived { sequence, .. }
            | Self::MessageDelivered { sequence, .. }
            | Self::ReadReceiptReceived { sequence, .. }
            | Self::MessageEdited { sequence, .. }
            | Self::MessageDeleted { sequence, .. }
            | Self::ParticipantAdded { sequence, .. }
            | Self::ParticipantRemoved { sequence, .. }
            | Self::TypingIndicatorReceived { sequence, .. }
            | Self::ThreadCreated { sequence, .. }
            | Self::ThreadDeleted { sequence, .. }
            | Self::ThreadPropertiesUpdated { sequence, .. }
            | Self::CallStateChanged { sequence, .. }
            | Self::ConnectionStateChanged { sequence, .. }
            | Self::DeviceListChanged { sequence, .. } => Some(*sequence),
            Self::Unknown => None,
        }
    }

    /// The thread or call this event belongs to, if any.
    pub fn conversation_id(&self) -> Option<&EntityId> {
        match self {
            Self::MessageReceived { thread_id, .. }
            | Self::MessageDelivered { thread_id, .. }
            | Self::ReadReceiptReceived { thread_id, .. }
            | Self::MessageEdited { thread_id, .. }
            | Self::MessageDeleted { thread_id, .. }
            | Self::ParticipantAdded { thread_id, .. }
            | Self::ParticipantRemoved { thread_id, .. }
            | Self::TypingIndicatorReceived { thread_id, .. }
            | Self::ThreadCreated { thread_id, .. }
            | Self::ThreadDeleted { thread_id, .. }
            | Self::ThreadPropertiesUpdated { thread_id, .. } => Some(thread_id),
            Self::CallStateChanged { call_id, .. } => Some(call_id),
            Self::ConnectionStateChanged { .. }
            | Self::DeviceListChanged { .. }
            | Self::Unknown => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_message_received() {
        let raw = json!({
            "kind": "messageReceived",
            "threadId": "t1",
            "sequence": 4,
            "message": {
                "id": "550e8400-e29b-41d4-a716-446655440000",
                "senderId": "u2",
                "senderDisplayName": "Ada",
                "content": "hello",
                "createdOn": "2024-05-01T10:00:00Z"
            }
        });

        let event: SdkEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.kind(), EventKind::MessageReceived);
        assert_eq!(event.sequence(), Some(4));
        assert_eq!(event.conversation_id(), Some(&EntityId::from("t1")));

        let SdkEvent::MessageReceived { message, .. } = event else {
            panic!("wrong variant");
        };
        assert_eq!(message.content, "hello");
        assert_eq!(message.kind, MessageKind::Text);
        assert!(message.id.as_uuid().is_some());
    }

    #[test]
    fn unknown_kind_maps_to_unknown_variant() {
        let raw = json!({ "kind": "pollVoteCast", "threadId": "t1", "sequence": 9 });
        let event: SdkEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event, SdkEvent::Unknown);
        assert_eq!(event.sequence(), None);
    }

    #[test]
    fn participant_presence_defaults_to_connected() {
        let raw = json!({
            "kind": "participantAdded",
            "threadId": "t1",
            "sequence": 1,
            "participant": { "id": "p1" }
        });
        let SdkEvent::ParticipantAdded { participant, .. } = serde_json::from_value(raw).unwrap()
        else {
            panic!("wrong variant");
        };
        assert_eq!(participant.presence, PresenceState::Connected);
        assert_eq!(participant.display_name, None);
    }

    #[test]
    fn event_kind_displays_camel_case() {
        assert_eq!(EventKind::TypingIndicatorReceived.to_string(), "typingIndicatorReceived");
        assert_eq!(
            "deviceListChanged".parse::<EventKind>().unwrap(),
            EventKind::DeviceListChanged
        );
    }
}
