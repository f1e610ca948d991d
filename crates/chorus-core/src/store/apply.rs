// ── Structural-sharing apply engine ──
//
// `RootState::apply` produces the next snapshot for one instruction, or
// `None` when the instruction changes nothing. Only the path from the root
// to the touched leaf is rebuilt; every other `Arc` is carried over as is.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use chorus_sdk::{ConnectionStatus, DeviceInfo, EntityId, MessagePayload, ParticipantPayload};

use super::instruction::Instruction;
use crate::model::{
    ConversationKind, ConversationState, ConversationStatus, DeviceList, DeviceState,
    DiagnosticError, Message, MessageStatus, OperationCategory, Participant, ParticipantStatus,
    RealtimeConnection, RootState, TOMBSTONE_CAPACITY, TypingIndicator,
};

/// `true` if `incoming` does not move past the `recorded` sequence.
/// A recorded sequence of zero means "never seen from the service".
fn is_stale(recorded: u64, incoming: u64) -> bool {
    recorded > 0 && incoming <= recorded
}

impl RootState {
    /// Apply `instruction`, returning the next snapshot with `version`
    /// bumped by one, or `None` if nothing changed.
    pub fn apply(&self, instruction: &Instruction) -> Option<RootState> {
        let mut next = self.apply_inner(instruction)?;
        next.version = self.version + 1;
        Some(next)
    }

    fn apply_inner(&self, instruction: &Instruction) -> Option<RootState> {
        match instruction {
            Instruction::UpsertConversation {
                id,
                kind,
                topic,
                created_on,
                sequence,
            } => self.upsert_conversation(id, *kind, topic.as_deref(), *created_on, *sequence),
            Instruction::RemoveConversation { id, sequence } => {
                self.remove_conversation(id, *sequence)
            }
            Instruction::UpdateTopic {
                conversation_id,
                topic,
                sequence,
            } => self.update_topic(conversation_id, topic.as_deref(), *sequence),
            Instruction::SetConversationStatus {
                conversation_id,
                kind,
                status,
                sequence,
            } => self.set_conversation_status(conversation_id, *kind, *status, *sequence),
            Instruction::AddPendingMessage {
                conversation_id,
                message,
            } => {
                if self.message_owner(&message.id).is_some() {
                    return None;
                }
                self.upsert_in(conversation_id, ConversationKind::Chat, 0, |c| {
                    Some(c.with_message(message.clone()))
                })
            }
            Instruction::FailMessage {
                conversation_id,
                message_id,
            } => self.update_message(conversation_id, message_id, |m| {
                (m.status == MessageStatus::Pending).then(|| Message {
                    status: MessageStatus::Failed,
                    ..m.clone()
                })
            }),
            Instruction::RetryMessage {
                conversation_id,
                message_id,
            } => self.update_message(conversation_id, message_id, |m| {
                (m.status == MessageStatus::Failed).then(|| Message {
                    status: MessageStatus::Pending,
                    ..m.clone()
                })
            }),
            Instruction::UpsertMessage {
                conversation_id,
                message,
                status,
                sequence,
            } => self.upsert_message(conversation_id, message, *status, *sequence),
            Instruction::AdvanceMessageStatus {
                conversation_id,
                message_id,
                status,
                sequence,
            } => self.update_message(conversation_id, message_id, |m| {
                if is_stale(m.sequence, *sequence) || !m.status.advances_to(*status) {
                    return None;
                }
                Some(Message {
                    status: *status,
                    sequence: *sequence,
                    ..m.clone()
                })
            }),
            Instruction::EditMessage {
                conversation_id,
                message_id,
                content,
                edited_on,
                sequence,
            } => self.update_message(conversation_id, message_id, |m| {
                if is_stale(m.sequence, *sequence) || m.is_deleted() {
                    return None;
                }
                Some(Message {
                    content: content.clone(),
                    edited_on: Some(*edited_on),
                    sequence: *sequence,
                    ..m.clone()
                })
            }),
            Instruction::DeleteMessage {
                conversation_id,
                message_id,
                deleted_on,
                sequence,
            } => self.update_message(conversation_id, message_id, |m| {
                if is_stale(m.sequence, *sequence) || m.is_deleted() {
                    return None;
                }
                Some(Message {
                    content: String::new(),
                    deleted_on: Some(*deleted_on),
                    sequence: *sequence,
                    ..m.clone()
                })
            }),
            Instruction::UpsertParticipant {
                conversation_id,
                participant,
                sequence,
            } => self.upsert_participant(conversation_id, participant, *sequence),
            Instruction::RemoveParticipant {
                conversation_id,
                participant_id,
                sequence,
            } => self.update_in(conversation_id, |c| {
                let departed = match c.participant(participant_id) {
                    Some(existing) if is_stale(existing.sequence, *sequence) => return None,
                    Some(existing) => Participant {
                        status: ParticipantStatus::Disconnected,
                        sequence: *sequence,
                        ..(**existing).clone()
                    },
                    None => Participant::departed(participant_id.clone(), *sequence),
                };
                Some(c.with_participant(departed))
            }),
            Instruction::SetTyping {
                conversation_id,
                participant_id,
                received_on,
                sequence,
            } => self.set_typing(conversation_id, participant_id, *received_on, *sequence),
            Instruction::ExpireTyping { older_than } => self.expire_typing(*older_than),
            Instruction::SetConnection { status, sequence } => {
                self.set_connection(*status, *sequence)
            }
            Instruction::ReplaceDevices { devices, sequence } => {
                self.replace_devices(devices, *sequence)
            }
            Instruction::RecordError { category, error } => Some(self.record_error(*category, error)),
            Instruction::ClearError { category } => self.clear_error(*category),
            Instruction::Batch(items) => {
                let mut acc: Option<RootState> = None;
                for item in items {
                    let base = acc.as_ref().unwrap_or(self);
                    if let Some(next) = base.apply_inner(item) {
                        acc = Some(next);
                    }
                }
                acc
            }
        }
    }

    // ── Path-copy helpers ────────────────────────────────────────────

    fn with_conversation(&self, conversation: ConversationState) -> RootState {
        let mut next = self.clone();
        Arc::make_mut(&mut next.conversations)
            .insert(conversation.id.clone(), Arc::new(conversation));
        next
    }

    /// Rewrite conversation `id`, creating an empty one of `kind` if it is
    /// unknown. Refuses tombstoned ids and value-identical rewrites.
    fn upsert_in<F>(
        &self,
        id: &EntityId,
        kind: ConversationKind,
        sequence: u64,
        f: F,
    ) -> Option<RootState>
    where
        F: FnOnce(&ConversationState) -> Option<ConversationState>,
    {
        if let Some(existing) = self.conversations.get(id) {
            return self.rewrite(existing, f);
        }
        if self.is_tombstoned(id, sequence) {
            return None;
        }
        let skeleton = ConversationState::new(id.clone(), kind);
        let next = f(&skeleton)?;
        Some(self.with_conversation(next))
    }

    /// Rewrite conversation `id` only if it already exists.
    fn update_in<F>(&self, id: &EntityId, f: F) -> Option<RootState>
    where
        F: FnOnce(&ConversationState) -> Option<ConversationState>,
    {
        let existing = self.conversations.get(id)?;
        self.rewrite(existing, f)
    }

    fn rewrite<F>(&self, existing: &Arc<ConversationState>, f: F) -> Option<RootState>
    where
        F: FnOnce(&ConversationState) -> Option<ConversationState>,
    {
        let next = f(existing)?;
        if next == **existing {
            return None;
        }
        Some(self.with_conversation(next))
    }

    fn update_message<F>(
        &self,
        conversation_id: &EntityId,
        message_id: &EntityId,
        f: F,
    ) -> Option<RootState>
    where
        F: FnOnce(&Message) -> Option<Message>,
    {
        self.update_in(conversation_id, |c| {
            let current = c.message(message_id)?;
            let next = f(current)?;
            Some(c.with_message(next))
        })
    }

    // ── Conversations ────────────────────────────────────────────────

    fn upsert_conversation(
        &self,
        id: &EntityId,
        kind: ConversationKind,
        topic: Option<&str>,
        created_on: Option<DateTime<Utc>>,
        sequence: u64,
    ) -> Option<RootState> {
        self.upsert_in(id, kind, sequence, |c| {
            if is_stale(c.sequence, sequence) {
                return None;
            }
            let mut next = c.clone();
            if let Some(topic) = topic {
                next.topic = Some(topic.to_owned());
            }
            if created_on.is_some() {
                next.created_on = created_on;
            }
            next.sequence = sequence;
            Some(next)
        })
    }

    fn remove_conversation(&self, id: &EntityId, sequence: u64) -> Option<RootState> {
        let prior = self.tombstones.get(id).copied();
        match self.conversations.get(id) {
            Some(existing) if existing.sequence > sequence => return None,
            None if prior.is_some_and(|at| at >= sequence) => return None,
            _ => {}
        }

        let mut next = self.clone();
        Arc::make_mut(&mut next.conversations).shift_remove(id);
        let tombstones = Arc::make_mut(&mut next.tombstones);
        tombstones.insert(id.clone(), prior.map_or(sequence, |at| at.max(sequence)));
        while tombstones.len() > TOMBSTONE_CAPACITY {
            tombstones.shift_remove_index(0);
        }
        Some(next)
    }

    fn set_conversation_status(
        &self,
        id: &EntityId,
        kind: ConversationKind,
        status: ConversationStatus,
        sequence: Option<u64>,
    ) -> Option<RootState> {
        self.upsert_in(id, kind, sequence.unwrap_or(0), |c| {
            let mut next = c.clone();
            if let Some(sequence) = sequence {
                if is_stale(c.sequence, sequence) {
                    return None;
                }
                next.sequence = sequence;
            }
            next.status = status;
            Some(next)
        })
    }

    fn update_topic(
        &self,
        id: &EntityId,
        topic: Option<&str>,
        sequence: Option<u64>,
    ) -> Option<RootState> {
        self.upsert_in(id, ConversationKind::Chat, sequence.unwrap_or(0), |c| {
            let mut next = c.clone();
            if let Some(sequence) = sequence {
                if is_stale(c.sequence, sequence) {
                    return None;
                }
                next.sequence = sequence;
            }
            next.topic = topic.map(str::to_owned);
            Some(next)
        })
    }

    // ── Messages ─────────────────────────────────────────────────────

    fn upsert_message(
        &self,
        conversation_id: &EntityId,
        payload: &MessagePayload,
        status: MessageStatus,
        sequence: u64,
    ) -> Option<RootState> {
        if self
            .message_owner(&payload.id)
            .is_some_and(|owner| owner != conversation_id)
        {
            return None;
        }
        self.upsert_in(conversation_id, ConversationKind::Chat, sequence, |c| {
            let next = match c.message(&payload.id) {
                Some(existing) => {
                    // Deletion is final; redelivery and history pages never restore content.
                    if is_stale(existing.sequence, sequence) || existing.is_deleted() {
                        return None;
                    }
                    let mut merged =
                        Message::from_payload(payload, sequence, existing.status.max(status));
                    merged.edited_on = existing.edited_on;
                    merged.deleted_on = existing.deleted_on;
                    if merged.sender_display_name.is_none() {
                        merged
                            .sender_display_name
                            .clone_from(&existing.sender_display_name);
                    }
                    merged
                }
                None => Message::from_payload(payload, sequence, status),
            };
            Some(c.with_message(next))
        })
    }

    // ── Participants / typing ────────────────────────────────────────

    fn upsert_participant(
        &self,
        conversation_id: &EntityId,
        payload: &ParticipantPayload,
        sequence: u64,
    ) -> Option<RootState> {
        self.upsert_in(conversation_id, ConversationKind::Chat, sequence, |c| {
            let next = match c.participant(&payload.id) {
                Some(existing) => {
                    if is_stale(existing.sequence, sequence) {
                        return None;
                    }
                    let incoming = ParticipantStatus::from(payload.presence);
                    // Rejoin resets presence; otherwise presence only moves forward.
                    let status = if existing.status.is_present()
                        && existing.status.rank() > incoming.rank()
                    {
                        existing.status
                    } else {
                        incoming
                    };
                    Participant {
                        id: payload.id.clone(),
                        display_name: payload
                            .display_name
                            .clone()
                            .or_else(|| existing.display_name.clone()),
                        status,
                        sequence,
                    }
                }
                None => Participant::from_payload(payload, sequence),
            };
            Some(c.with_participant(next))
        })
    }

    fn set_typing(
        &self,
        conversation_id: &EntityId,
        participant_id: &EntityId,
        received_on: DateTime<Utc>,
        sequence: u64,
    ) -> Option<RootState> {
        self.update_in(conversation_id, |c| {
            if c
                .participant(participant_id)
                .is_some_and(|p| !p.status.is_present())
            {
                return None;
            }
            if c
                .typing
                .get(participant_id)
                .is_some_and(|t| is_stale(t.sequence, sequence))
            {
                return None;
            }
            Some(c.with_typing(TypingIndicator {
                participant_id: participant_id.clone(),
                received_on,
                sequence,
            }))
        })
    }

    fn expire_typing(&self, older_than: DateTime<Utc>) -> Option<RootState> {
        let expired: Vec<ConversationState> = self
            .conversations
            .values()
            .filter_map(|c| c.without_typing_before(older_than))
            .collect();
        if expired.is_empty() {
            return None;
        }
        let mut next = self.clone();
        let conversations = Arc::make_mut(&mut next.conversations);
        for conversation in expired {
            conversations.insert(conversation.id.clone(), Arc::new(conversation));
        }
        Some(next)
    }

    // ── Session-wide sections ────────────────────────────────────────

    fn set_connection(
        &self,
        status: ConnectionStatus,
        sequence: Option<u64>,
    ) -> Option<RootState> {
        if sequence.is_some_and(|s| is_stale(self.connection.sequence, s)) {
            return None;
        }
        let connection = RealtimeConnection {
            status,
            sequence: sequence.unwrap_or(self.connection.sequence),
        };
        if connection == *self.connection {
            return None;
        }
        let mut next = self.clone();
        next.connection = Arc::new(connection);
        Some(next)
    }

    fn replace_devices(&self, devices: &[DeviceInfo], sequence: Option<u64>) -> Option<RootState> {
        let current = &self.devices;
        if sequence.is_some_and(|s| is_stale(current.sequence, s)) {
            return None;
        }

        let mut list = DeviceList {
            sequence: sequence.unwrap_or(current.sequence),
            devices: indexmap::IndexMap::with_capacity(devices.len()),
        };
        for info in devices {
            let state = DeviceState::from(info);
            let shared = current
                .devices
                .get(&info.id)
                .filter(|old| ***old == state)
                .cloned()
                .unwrap_or_else(|| Arc::new(state));
            list.devices.insert(info.id.clone(), shared);
        }

        let unchanged = list.sequence == current.sequence
            && list.devices.len() == current.devices.len()
            && list
                .devices
                .iter()
                .zip(current.devices.iter())
                .all(|((a, x), (b, y))| a == b && Arc::ptr_eq(x, y));
        if unchanged {
            return None;
        }

        let mut next = self.clone();
        next.devices = Arc::new(list);
        Some(next)
    }

    fn record_error(&self, category: OperationCategory, error: &DiagnosticError) -> RootState {
        let mut next = self.clone();
        Arc::make_mut(&mut next.diagnostics)
            .latest
            .insert(category, Arc::new(error.clone()));
        next
    }

    fn clear_error(&self, category: OperationCategory) -> Option<RootState> {
        if !self.diagnostics.latest.contains_key(&category) {
            return None;
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.diagnostics)
            .latest
            .shift_remove(&category);
        Some(next)
    }
}
