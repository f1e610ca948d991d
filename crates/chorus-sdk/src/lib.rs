// chorus-sdk: Boundary contract for the externally owned chat/call session SDK.
//
// The SDK itself is a black box. This crate only describes what the
// synchronization layer consumes from it: the operation surface
// (`SessionSdk` / `ThreadSdk`), the typed event feed, the listener
// registry semantics, and the failure modes. The `mock` module provides
// an in-memory implementation for tests.

pub mod emitter;
pub mod error;
pub mod event;
pub mod id;
pub mod mock;
pub mod session;
pub mod types;

pub use emitter::{EventEmitter, Listener};
pub use error::Error;
pub use event::{
    CallStatus, ConnectionStatus, DevicePayload, EventKind, MessagePayload, ParticipantPayload,
    PresenceState, SdkEvent,
};
pub use id::EntityId;
pub use session::{SessionSdk, ThreadSdk};
pub use types::{
    CreateThreadRequest, DeviceInfo, DeviceKind, MessageKind, MessageRecord, Page, PageRequest,
    SendMessageRequest, SendMessageResult, ThreadInfo,
};
