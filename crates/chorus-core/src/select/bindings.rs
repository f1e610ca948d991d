// ── Component bindings ──
//
// One selector per UI component, plus `Bindings`, which routes a
// `ComponentKey` to a memoized instance (one per conversation for
// conversation-scoped components).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use chorus_sdk::{ConnectionStatus, DeviceKind, EntityId, MessageKind};

use super::{Memoized, Selector};
use crate::model::{
    ConversationKind, ConversationMap, ConversationStatus, DeviceList, DiagnosticKind,
    Diagnostics, EntryMap, Message, MessageStatus, OperationCategory, Participant,
    ParticipantStatus, RealtimeConnection, RootState, TypingIndicator,
};

fn messages_of(state: &RootState, id: &EntityId) -> Option<Arc<EntryMap<Message>>> {
    state.conversation(id).map(|c| Arc::clone(&c.messages))
}

fn participants_of(state: &RootState, id: &EntityId) -> Option<Arc<EntryMap<Participant>>> {
    state.conversation(id).map(|c| Arc::clone(&c.participants))
}

// ── Message thread ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageView {
    pub id: EntityId,
    pub content: String,
    pub kind: MessageKind,
    pub sender_display_name: Option<String>,
    pub status: MessageStatus,
    pub is_own: bool,
    pub edited: bool,
    pub created_on: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageThreadProps {
    /// Visible messages, oldest first. Deleted messages are omitted.
    pub messages: Vec<MessageView>,
}

pub struct MessageThreadSelector {
    pub local_user: EntityId,
}

impl Selector for MessageThreadSelector {
    type Args = EntityId;
    type Slices = Option<Arc<EntryMap<Message>>>;
    type Props = MessageThreadProps;

    fn slices(&self, state: &RootState, id: &EntityId) -> Self::Slices {
        messages_of(state, id)
    }

    fn derive(&self, slices: &Self::Slices, _id: &EntityId) -> MessageThreadProps {
        let Some(messages) = slices else {
            return MessageThreadProps::default();
        };
        let mut views: Vec<MessageView> = messages
            .values()
            .filter(|m| !m.is_deleted())
            .map(|m| MessageView {
                id: m.id.clone(),
                content: m.content.clone(),
                kind: m.kind,
                sender_display_name: m.sender_display_name.clone(),
                status: m.status,
                is_own: m.sender_id.as_ref() == Some(&self.local_user),
                edited: m.edited_on.is_some(),
                created_on: m.created_on,
            })
            .collect();
        views.sort_by_key(|m| m.created_on);
        MessageThreadProps { messages: views }
    }
}

// ── Participant list ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantView {
    pub id: EntityId,
    pub display_name: Option<String>,
    pub status: ParticipantStatus,
    pub is_self: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParticipantListProps {
    /// Present participants in join order.
    pub participants: Vec<ParticipantView>,
}

pub struct ParticipantListSelector {
    pub local_user: EntityId,
}

impl Selector for ParticipantListSelector {
    type Args = EntityId;
    type Slices = Option<Arc<EntryMap<Participant>>>;
    type Props = ParticipantListProps;

    fn slices(&self, state: &RootState, id: &EntityId) -> Self::Slices {
        participants_of(state, id)
    }

    fn derive(&self, slices: &Self::Slices, _id: &EntityId) -> ParticipantListProps {
        let participants = slices
            .iter()
            .flat_map(|map| map.values())
            .filter(|p| p.status.is_present())
            .map(|p| ParticipantView {
                id: p.id.clone(),
                display_name: p.display_name.clone(),
                status: p.status,
                is_self: p.id == self.local_user,
            })
            .collect();
        ParticipantListProps { participants }
    }
}

// ── Typing indicator ─────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TypingIndicatorProps {
    /// Display names (or ids) of remote participants currently typing.
    pub typing: Vec<String>,
}

pub struct TypingIndicatorSelector {
    pub local_user: EntityId,
}

impl Selector for TypingIndicatorSelector {
    type Args = EntityId;
    type Slices = (
        Option<Arc<EntryMap<TypingIndicator>>>,
        Option<Arc<EntryMap<Participant>>>,
    );
    type Props = TypingIndicatorProps;

    fn slices(&self, state: &RootState, id: &EntityId) -> Self::Slices {
        (
            state.conversation(id).map(|c| Arc::clone(&c.typing)),
            participants_of(state, id),
        )
    }

    fn derive(&self, (typing, participants): &Self::Slices, _id: &EntityId) -> TypingIndicatorProps {
        let Some(typing) = typing else {
            return TypingIndicatorProps::default();
        };
        let typing = typing
            .keys()
            .filter(|id| **id != self.local_user)
            .map(|id| {
                participants
                    .as_ref()
                    .and_then(|p| p.get(id))
                    .and_then(|p| p.display_name.clone())
                    .unwrap_or_else(|| id.to_string())
            })
            .collect();
        TypingIndicatorProps { typing }
    }
}

// ── Send box ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SendBoxProps {
    /// No conversation to send to.
    pub disabled: bool,
    pub pending: usize,
    /// Failed messages the user can retry.
    pub failed: Vec<EntityId>,
    pub last_error: Option<String>,
}

pub struct SendBoxSelector;

impl Selector for SendBoxSelector {
    type Args = EntityId;
    type Slices = (Option<Arc<EntryMap<Message>>>, Arc<Diagnostics>);
    type Props = SendBoxProps;

    fn slices(&self, state: &RootState, id: &EntityId) -> Self::Slices {
        (messages_of(state, id), Arc::clone(&state.diagnostics))
    }

    fn derive(&self, (messages, diagnostics): &Self::Slices, _id: &EntityId) -> SendBoxProps {
        let last_error = diagnostics
            .get(OperationCategory::SendMessage)
            .map(|e| e.message.clone());
        let Some(messages) = messages else {
            return SendBoxProps {
                disabled: true,
                last_error,
                ..SendBoxProps::default()
            };
        };
        SendBoxProps {
            disabled: false,
            pending: messages
                .values()
                .filter(|m| m.status == MessageStatus::Pending)
                .count(),
            failed: messages
                .values()
                .filter(|m| m.status == MessageStatus::Failed)
                .map(|m| m.id.clone())
                .collect(),
            last_error,
        }
    }
}

// ── Thread list ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreadSummary {
    pub id: EntityId,
    pub kind: ConversationKind,
    pub topic: Option<String>,
    pub status: ConversationStatus,
    pub message_count: usize,
    pub last_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ThreadListProps {
    pub threads: Vec<ThreadSummary>,
}

pub struct ThreadListSelector;

impl Selector for ThreadListSelector {
    type Args = ();
    type Slices = Arc<ConversationMap>;
    type Props = ThreadListProps;

    fn slices(&self, state: &RootState, _args: &()) -> Self::Slices {
        Arc::clone(&state.conversations)
    }

    fn derive(&self, conversations: &Self::Slices, _args: &()) -> ThreadListProps {
        let threads = conversations
            .values()
            .map(|c| {
                let visible = || c.messages.values().filter(|m| !m.is_deleted());
                ThreadSummary {
                    id: c.id.clone(),
                    kind: c.kind,
                    topic: c.topic.clone(),
                    status: c.status,
                    message_count: visible().count(),
                    last_message: visible()
                        .max_by_key(|m| m.created_on)
                        .map(|m| m.content.clone()),
                }
            })
            .collect();
        ThreadListProps { threads }
    }
}

// ── Device picker ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceOption {
    pub id: EntityId,
    pub name: String,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DevicePickerProps {
    pub cameras: Vec<DeviceOption>,
    pub microphones: Vec<DeviceOption>,
    pub speakers: Vec<DeviceOption>,
    pub selected_camera: Option<EntityId>,
    pub selected_microphone: Option<EntityId>,
    pub selected_speaker: Option<EntityId>,
}

pub struct DevicePickerSelector;

impl Selector for DevicePickerSelector {
    type Args = ();
    type Slices = Arc<DeviceList>;
    type Props = DevicePickerProps;

    fn slices(&self, state: &RootState, _args: &()) -> Self::Slices {
        Arc::clone(&state.devices)
    }

    fn derive(&self, devices: &Self::Slices, _args: &()) -> DevicePickerProps {
        let options = |kind| -> Vec<DeviceOption> {
            devices
                .of_kind(kind)
                .map(|d| DeviceOption {
                    id: d.id.clone(),
                    name: d.name.clone(),
                    is_default: d.is_default,
                })
                .collect()
        };
        let selected = |kind| devices.preferred(kind).map(|d| d.id.clone());
        DevicePickerProps {
            cameras: options(DeviceKind::Camera),
            microphones: options(DeviceKind::Microphone),
            speakers: options(DeviceKind::Speaker),
            selected_camera: selected(DeviceKind::Camera),
            selected_microphone: selected(DeviceKind::Microphone),
            selected_speaker: selected(DeviceKind::Speaker),
        }
    }
}

// ── Error bar ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBanner {
    pub category: OperationCategory,
    pub kind: DiagnosticKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorBarProps {
    pub errors: Vec<ErrorBanner>,
    pub connection: ConnectionStatus,
}

pub struct ErrorBarSelector;

impl Selector for ErrorBarSelector {
    type Args = ();
    type Slices = (Arc<Diagnostics>, Arc<RealtimeConnection>);
    type Props = ErrorBarProps;

    fn slices(&self, state: &RootState, _args: &()) -> Self::Slices {
        (
            Arc::clone(&state.diagnostics),
            Arc::clone(&state.connection),
        )
    }

    fn derive(&self, (diagnostics, connection): &Self::Slices, _args: &()) -> ErrorBarProps {
        ErrorBarProps {
            errors: diagnostics
                .latest
                .iter()
                .map(|(category, error)| ErrorBanner {
                    category: *category,
                    kind: error.kind,
                    message: error.message.clone(),
                })
                .collect(),
            connection: connection.status,
        }
    }
}

// ── Routing ──────────────────────────────────────────────────────────

/// Identifies one bound UI component.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ComponentKey {
    MessageThread(EntityId),
    ParticipantList(EntityId),
    TypingIndicator(EntityId),
    SendBox(EntityId),
    ThreadList,
    DevicePicker,
    ErrorBar,
}

/// Props for one component, as returned by [`Bindings::select`].
#[derive(Debug, Clone)]
pub enum Props {
    MessageThread(Arc<MessageThreadProps>),
    ParticipantList(Arc<ParticipantListProps>),
    TypingIndicator(Arc<TypingIndicatorProps>),
    SendBox(Arc<SendBoxProps>),
    ThreadList(Arc<ThreadListProps>),
    DevicePicker(Arc<DevicePickerProps>),
    ErrorBar(Arc<ErrorBarProps>),
}

impl Props {
    /// `true` if both hold the very same props allocation.
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::MessageThread(a), Self::MessageThread(b)) => Arc::ptr_eq(a, b),
            (Self::ParticipantList(a), Self::ParticipantList(b)) => Arc::ptr_eq(a, b),
            (Self::TypingIndicator(a), Self::TypingIndicator(b)) => Arc::ptr_eq(a, b),
            (Self::SendBox(a), Self::SendBox(b)) => Arc::ptr_eq(a, b),
            (Self::ThreadList(a), Self::ThreadList(b)) => Arc::ptr_eq(a, b),
            (Self::DevicePicker(a), Self::DevicePicker(b)) => Arc::ptr_eq(a, b),
            (Self::ErrorBar(a), Self::ErrorBar(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

type Slots<S> = DashMap<EntityId, Arc<Memoized<S>>>;

/// Get (or create) the memoized selector for `id`. The map guard is
/// released before the selector runs.
///
/// Only conversations present in `state` keep a slot; for any other id the
/// selector is built fresh and a leftover slot is dropped.
fn slot<S: Selector>(
    slots: &Slots<S>,
    state: &RootState,
    id: &EntityId,
    make: impl FnOnce() -> S,
) -> Arc<Memoized<S>> {
    if state.conversation(id).is_none() {
        slots.remove(id);
        return Arc::new(Memoized::new(make()));
    }
    Arc::clone(
        slots
            .entry(id.clone())
            .or_insert_with(|| Arc::new(Memoized::new(make())))
            .value(),
    )
}

/// Memoized selectors for every component, keyed per conversation where
/// the component is conversation-scoped.
pub struct Bindings {
    local_user: EntityId,
    message_threads: Slots<MessageThreadSelector>,
    participant_lists: Slots<ParticipantListSelector>,
    typing_indicators: Slots<TypingIndicatorSelector>,
    send_boxes: Slots<SendBoxSelector>,
    thread_list: Memoized<ThreadListSelector>,
    device_picker: Memoized<DevicePickerSelector>,
    error_bar: Memoized<ErrorBarSelector>,
}

impl Bindings {
    pub fn new(local_user: EntityId) -> Self {
        Self {
            local_user,
            message_threads: DashMap::new(),
            participant_lists: DashMap::new(),
            typing_indicators: DashMap::new(),
            send_boxes: DashMap::new(),
            thread_list: Memoized::new(ThreadListSelector),
            device_picker: Memoized::new(DevicePickerSelector),
            error_bar: Memoized::new(ErrorBarSelector),
        }
    }

    pub fn select(&self, state: &RootState, key: &ComponentKey) -> Props {
        match key {
            ComponentKey::MessageThread(id) => {
                let memo = slot(&self.message_threads, state, id, || MessageThreadSelector {
                    local_user: self.local_user.clone(),
                });
                Props::MessageThread(memo.select(state, id))
            }
            ComponentKey::ParticipantList(id) => {
                let memo = slot(&self.participant_lists, state, id, || ParticipantListSelector {
                    local_user: self.local_user.clone(),
                });
                Props::ParticipantList(memo.select(state, id))
            }
            ComponentKey::TypingIndicator(id) => {
                let memo = slot(&self.typing_indicators, state, id, || TypingIndicatorSelector {
                    local_user: self.local_user.clone(),
                });
                Props::TypingIndicator(memo.select(state, id))
            }
            ComponentKey::SendBox(id) => {
                let memo = slot(&self.send_boxes, state, id, || SendBoxSelector);
                Props::SendBox(memo.select(state, id))
            }
            ComponentKey::ThreadList => Props::ThreadList(self.thread_list.select(state, &())),
            ComponentKey::DevicePicker => {
                Props::DevicePicker(self.device_picker.select(state, &()))
            }
            ComponentKey::ErrorBar => Props::ErrorBar(self.error_bar.select(state, &())),
        }
    }

    /// Drop the memoized selectors of conversation `id`.
    pub fn release(&self, id: &EntityId) {
        self.message_threads.remove(id);
        self.participant_lists.remove(id);
        self.typing_indicators.remove(id);
        self.send_boxes.remove(id);
    }

    /// Number of conversation-scoped selector slots held.
    pub fn slot_count(&self) -> usize {
        self.message_threads.len()
            + self.participant_lists.len()
            + self.typing_indicators.len()
            + self.send_boxes.len()
    }

    /// Drop every cached result.
    pub fn clear(&self) {
        self.message_threads.clear();
        self.participant_lists.clear();
        self.typing_indicators.clear();
        self.send_boxes.clear();
        self.thread_list.reset();
        self.device_picker.reset();
        self.error_bar.reset();
    }
}

impl std::fmt::Debug for Bindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bindings")
            .field("local_user", &self.local_user)
            .field("slots", &self.slot_count())
            .finish_non_exhaustive()
    }
}
