// ── Unified domain model ──
//
// Every type in this module is part of the immutable state tree. Collections
// hold `Arc`s so a commit can rebuild only the path it touched and leave
// every sibling pointer-identical to the previous snapshot.

pub mod conversation;
pub mod device;
pub mod diagnostics;
pub mod message;
pub mod participant;
pub mod root;

// ── Re-exports ──────────────────────────────────────────────────────
// Flat access: `use chorus_core::model::*` gives you everything.

pub use chorus_sdk::EntityId;

pub use conversation::{ConversationKind, ConversationState, ConversationStatus, TypingIndicator};
pub use device::{DeviceList, DeviceState};
pub use diagnostics::{DiagnosticError, DiagnosticKind, Diagnostics, OperationCategory};
pub use message::{Message, MessageStatus};
pub use participant::{Participant, ParticipantStatus};
pub use root::{ConversationMap, EntryMap, RealtimeConnection, RootState, TOMBSTONE_CAPACITY};
