// ── Event translator ──
//
// Turns one SDK event into at most one state instruction. Pure: reads the
// current snapshot to detect duplicates and ordering problems, never
// mutates it. Duplicate, stale and unknown events are dropped quietly;
// structurally invalid ones are logged as internal-state errors.

use std::collections::HashSet;

use tracing::{debug, warn};

use chorus_sdk::{EntityId, SdkEvent};

use crate::error::CoreError;
use crate::model::{ConversationKind, ConversationState, MessageStatus, RootState};
use crate::store::Instruction;

/// Map `event` to the instruction that applies it, or `None` if it must
/// be dropped.
pub fn translate(state: &RootState, event: &SdkEvent) -> Option<Instruction> {
    match check(state, event) {
        Ok(Some(instruction)) => Some(instruction),
        Ok(None) => {
            debug!(
                kind = %event.kind(),
                sequence = ?event.sequence(),
                "event dropped (duplicate, stale or unknown)"
            );
            None
        }
        Err(err) => {
            warn!(kind = %event.kind(), error = %err, "invalid event dropped");
            None
        }
    }
}

fn invalid(message: impl Into<String>) -> CoreError {
    CoreError::InternalState {
        message: message.into(),
    }
}

fn require_id(id: &EntityId, what: &str) -> Result<(), CoreError> {
    if id.is_empty() {
        return Err(invalid(format!("{what} id is empty")));
    }
    Ok(())
}

/// `true` if `sequence` has already been applied at `recorded`.
fn seen(recorded: u64, sequence: u64) -> bool {
    recorded > 0 && sequence <= recorded
}

/// Gate for events on a conversation: tombstoned ids are dropped.
fn live<'a>(
    state: &'a RootState,
    id: &EntityId,
    sequence: u64,
) -> Result<Option<Option<&'a ConversationState>>, CoreError> {
    require_id(id, "conversation")?;
    if state.is_tombstoned(id, sequence) {
        return Ok(None);
    }
    Ok(Some(state.conversation(id).map(|c| &**c)))
}

#[allow(clippy::too_many_lines)]
fn check(state: &RootState, event: &SdkEvent) -> Result<Option<Instruction>, CoreError> {
    let instruction = match event {
        SdkEvent::MessageReceived {
            thread_id,
            message,
            sequence,
        } => {
            let Some(conversation) = live(state, thread_id, *sequence)? else {
                return Ok(None);
            };
            require_id(&message.id, "message")?;
            if let Some(owner) = state.message_owner(&message.id) {
                if owner != thread_id {
                    return Err(invalid(format!(
                        "message {} already belongs to conversation {owner}",
                        message.id
                    )));
                }
            }
            if conversation
                .and_then(|c| c.message(&message.id))
                .is_some_and(|m| seen(m.sequence, *sequence))
            {
                return Ok(None);
            }
            Instruction::UpsertMessage {
                conversation_id: thread_id.clone(),
                message: message.clone(),
                status: MessageStatus::Confirmed,
                sequence: *sequence,
            }
        }

        SdkEvent::MessageDelivered {
            thread_id,
            message_id,
            sequence,
        } => {
            let Some(message) = existing_message(state, thread_id, message_id, *sequence)? else {
                return Ok(None);
            };
            if !message.status.advances_to(MessageStatus::Delivered) {
                return Ok(None);
            }
            Instruction::AdvanceMessageStatus {
                conversation_id: thread_id.clone(),
                message_id: message_id.clone(),
                status: MessageStatus::Delivered,
                sequence: *sequence,
            }
        }

        SdkEvent::ReadReceiptReceived {
            thread_id,
            message_id,
            reader_id,
            sequence,
        } => {
            require_id(reader_id, "reader")?;
            let Some(message) = existing_message(state, thread_id, message_id, *sequence)? else {
                return Ok(None);
            };
            if !message.status.advances_to(MessageStatus::Read) {
                return Ok(None);
            }
            Instruction::AdvanceMessageStatus {
                conversation_id: thread_id.clone(),
                message_id: message_id.clone(),
                status: MessageStatus::Read,
                sequence: *sequence,
            }
        }

        SdkEvent::MessageEdited {
            thread_id,
            message_id,
            content,
            edited_on,
            sequence,
        } => {
            let Some(message) = existing_message(state, thread_id, message_id, *sequence)? else {
                return Ok(None);
            };
            if message.is_deleted() {
                return Ok(None);
            }
            Instruction::EditMessage {
                conversation_id: thread_id.clone(),
                message_id: message_id.clone(),
                content: content.clone(),
                edited_on: *edited_on,
                sequence: *sequence,
            }
        }

        SdkEvent::MessageDeleted {
            thread_id,
            message_id,
            deleted_on,
            sequence,
        } => {
            let Some(message) = existing_message(state, thread_id, message_id, *sequence)? else {
                return Ok(None);
            };
            if message.is_deleted() {
                return Ok(None);
            }
            Instruction::DeleteMessage {
                conversation_id: thread_id.clone(),
                message_id: message_id.clone(),
                deleted_on: *deleted_on,
                sequence: *sequence,
            }
        }

        SdkEvent::ParticipantAdded {
            thread_id,
            participant,
            sequence,
        } => {
            let Some(conversation) = live(state, thread_id, *sequence)? else {
                return Ok(None);
            };
            require_id(&participant.id, "participant")?;
            if conversation
                .and_then(|c| c.participant(&participant.id))
                .is_some_and(|p| seen(p.sequence, *sequence))
            {
                return Ok(None);
            }
            Instruction::UpsertParticipant {
                conversation_id: thread_id.clone(),
                participant: participant.clone(),
                sequence: *sequence,
            }
        }

        SdkEvent::ParticipantRemoved {
            thread_id,
            participant_id,
            sequence,
        } => {
            let Some(Some(conversation)) = live(state, thread_id, *sequence)? else {
                return Ok(None);
            };
            require_id(participant_id, "participant")?;
            if conversation
                .participant(participant_id)
                .is_some_and(|p| seen(p.sequence, *sequence))
            {
                return Ok(None);
            }
            Instruction::RemoveParticipant {
                conversation_id: thread_id.clone(),
                participant_id: participant_id.clone(),
                sequence: *sequence,
            }
        }

        SdkEvent::TypingIndicatorReceived {
            thread_id,
            sender_id,
            received_on,
            sequence,
        } => {
            let Some(Some(conversation)) = live(state, thread_id, *sequence)? else {
                return Ok(None);
            };
            require_id(sender_id, "sender")?;
            if conversation
                .typing
                .get(sender_id)
                .is_some_and(|t| seen(t.sequence, *sequence))
            {
                return Ok(None);
            }
            Instruction::SetTyping {
                conversation_id: thread_id.clone(),
                participant_id: sender_id.clone(),
                received_on: *received_on,
                sequence: *sequence,
            }
        }

        SdkEvent::ThreadCreated {
            thread_id,
            topic,
            created_on,
            sequence,
        } => {
            let Some(conversation) = live(state, thread_id, *sequence)? else {
                return Ok(None);
            };
            if conversation.is_some_and(|c| seen(c.sequence, *sequence)) {
                return Ok(None);
            }
            Instruction::UpsertConversation {
                id: thread_id.clone(),
                kind: ConversationKind::Chat,
                topic: topic.clone(),
                created_on: *created_on,
                sequence: *sequence,
            }
        }

        SdkEvent::ThreadDeleted {
            thread_id,
            sequence,
        } => {
            require_id(thread_id, "conversation")?;
            if state.is_tombstoned(thread_id, *sequence) {
                return Ok(None);
            }
            Instruction::RemoveConversation {
                id: thread_id.clone(),
                sequence: *sequence,
            }
        }

        SdkEvent::ThreadPropertiesUpdated {
            thread_id,
            topic,
            sequence,
        } => {
            let Some(conversation) = live(state, thread_id, *sequence)? else {
                return Ok(None);
            };
            if conversation.is_some_and(|c| seen(c.sequence, *sequence)) {
                return Ok(None);
            }
            Instruction::UpdateTopic {
                conversation_id: thread_id.clone(),
                topic: topic.clone(),
                sequence: Some(*sequence),
            }
        }

        SdkEvent::CallStateChanged {
            call_id,
            status,
            sequence,
        } => {
            let Some(conversation) = live(state, call_id, *sequence)? else {
                return Ok(None);
            };
            if conversation.is_some_and(|c| seen(c.sequence, *sequence)) {
                return Ok(None);
            }
            Instruction::SetConversationStatus {
                conversation_id: call_id.clone(),
                kind: ConversationKind::Call,
                status: (*status).into(),
                sequence: Some(*sequence),
            }
        }

        SdkEvent::ConnectionStateChanged { status, sequence } => {
            if seen(state.connection.sequence, *sequence) {
                return Ok(None);
            }
            Instruction::SetConnection {
                status: *status,
                sequence: Some(*sequence),
            }
        }

        SdkEvent::DeviceListChanged { devices, sequence } => {
            if seen(state.devices.sequence, *sequence) {
                return Ok(None);
            }
            let mut ids = HashSet::with_capacity(devices.len());
            for device in devices {
                require_id(&device.id, "device")?;
                if !ids.insert(&device.id) {
                    return Err(invalid(format!("duplicate device id {}", device.id)));
                }
            }
            Instruction::ReplaceDevices {
                devices: devices.clone(),
                sequence: Some(*sequence),
            }
        }

        SdkEvent::Unknown => return Ok(None),
    };
    Ok(Some(instruction))
}

/// Look up a message an update event refers to. `Ok(None)` for unknown
/// conversations, unknown messages, or an already-applied sequence.
fn existing_message<'a>(
    state: &'a RootState,
    thread_id: &EntityId,
    message_id: &EntityId,
    sequence: u64,
) -> Result<Option<&'a crate::model::Message>, CoreError> {
    let Some(Some(conversation)) = live(state, thread_id, sequence)? else {
        return Ok(None);
    };
    require_id(message_id, "message")?;
    Ok(conversation
        .message(message_id)
        .map(|m| &**m)
        .filter(|m| !seen(m.sequence, sequence)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chorus_sdk::{DeviceInfo, DeviceKind, MessageKind, MessagePayload};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    use super::*;

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    fn received(thread: &str, msg: &str, sequence: u64) -> SdkEvent {
        SdkEvent::MessageReceived {
            thread_id: id(thread),
            message: MessagePayload {
                id: id(msg),
                sender_id: Some(id("bob")),
                sender_display_name: None,
                content: "hello".into(),
                kind: MessageKind::Text,
                created_on: Utc::now(),
            },
            sequence,
        }
    }

    fn commit(state: &RootState, event: &SdkEvent) -> RootState {
        state.apply(&translate(state, event).unwrap()).unwrap()
    }

    #[test]
    fn duplicate_delivery_translates_to_nothing() {
        let state = commit(&RootState::default(), &received("t1", "m1", 3));
        assert!(translate(&state, &received("t1", "m1", 3)).is_none());
        assert!(translate(&state, &received("t1", "m1", 2)).is_none());
    }

    #[test]
    fn message_owned_elsewhere_is_rejected() {
        let state = commit(&RootState::default(), &received("t1", "m1", 1));
        assert!(translate(&state, &received("t2", "m1", 2)).is_none());
        assert!(state.conversation(&id("t2")).is_none());
    }

    #[test]
    fn empty_ids_are_rejected() {
        let state = RootState::default();
        assert!(translate(&state, &received("", "m1", 1)).is_none());
        assert!(translate(&state, &received("t1", "  ", 1)).is_none());
    }

    #[test]
    fn updates_for_unknown_messages_are_dropped() {
        let state = commit(&RootState::default(), &received("t1", "m1", 1));
        let delivered = SdkEvent::MessageDelivered {
            thread_id: id("t1"),
            message_id: id("ghost"),
            sequence: 2,
        };
        assert!(translate(&state, &delivered).is_none());
    }

    #[test]
    fn read_receipt_advances_confirmed_message() {
        let state = commit(&RootState::default(), &received("t1", "m1", 1));
        let read = SdkEvent::ReadReceiptReceived {
            thread_id: id("t1"),
            message_id: id("m1"),
            reader_id: id("carol"),
            sequence: 2,
        };
        let state = commit(&state, &read);
        let message = state
            .conversation(&id("t1"))
            .unwrap()
            .message(&id("m1"))
            .unwrap()
            .clone();
        assert_eq!(message.status, MessageStatus::Read);

        let late = SdkEvent::MessageDelivered {
            thread_id: id("t1"),
            message_id: id("m1"),
            sequence: 3,
        };
        assert!(translate(&state, &late).is_none());
    }

    #[test]
    fn duplicate_device_ids_are_invalid() {
        let mic = DeviceInfo {
            id: id("mic"),
            name: "Mic".into(),
            kind: DeviceKind::Microphone,
            is_default: false,
        };
        let event = SdkEvent::DeviceListChanged {
            devices: vec![mic.clone(), mic],
            sequence: 1,
        };
        assert!(translate(&RootState::default(), &event).is_none());
    }

    #[test]
    fn deleted_thread_stays_deleted() {
        let state = commit(&RootState::default(), &received("t1", "m1", 1));
        let state = commit(
            &state,
            &SdkEvent::ThreadDeleted {
                thread_id: id("t1"),
                sequence: 5,
            },
        );
        assert!(translate(&state, &received("t1", "m2", 4)).is_none());
        let stale_create = SdkEvent::ThreadCreated {
            thread_id: id("t1"),
            topic: None,
            created_on: None,
            sequence: 2,
        };
        assert!(translate(&state, &stale_create).is_none());
    }

    #[test]
    fn unknown_events_are_ignored() {
        assert!(translate(&RootState::default(), &SdkEvent::Unknown).is_none());
    }

    #[test]
    fn call_state_maps_to_conversation_status() {
        let event = SdkEvent::CallStateChanged {
            call_id: id("call-1"),
            status: chorus_sdk::CallStatus::Ringing,
            sequence: 1,
        };
        let state = commit(&RootState::default(), &event);
        let call = state.conversation(&id("call-1")).unwrap();
        assert_eq!(call.kind, ConversationKind::Call);
        assert_eq!(call.status, crate::model::ConversationStatus::Connecting);
    }
}
