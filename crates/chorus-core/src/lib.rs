// chorus-core: Versioned, subscribable state mirror between chorus-sdk and UI bindings.

pub mod client;
pub mod config;
pub mod error;
pub mod handle;
pub mod model;
pub mod select;
pub mod store;
pub mod stream;
pub mod translate;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{CallHandle, SyncClient, ThreadClient};
pub use config::{SessionCredentials, SyncConfig};
pub use error::CoreError;
pub use handle::{Handle, HandleCache};
pub use select::{Bindings, ComponentKey, Memoized, Props, Selector, SliceKey};
pub use store::{Instruction, StateHandler, StateStore, SubscriptionRegistry};
pub use stream::{StateStream, StateWatchStream};
pub use translate::translate;

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ConversationKind, ConversationState, ConversationStatus, DeviceList, DeviceState,
    DiagnosticError, DiagnosticKind, Diagnostics, EntityId, Message, MessageStatus,
    OperationCategory, Participant, ParticipantStatus, RealtimeConnection, RootState,
    TypingIndicator,
};
