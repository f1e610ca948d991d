//! Operation surface of the wrapped session SDK.
//!
//! The synchronization layer is generic over these traits. Every
//! operation is an `async` round-trip; `on` / `off` are synchronous and
//! follow [`EventEmitter`](crate::EventEmitter) semantics (dedup by
//! reference, removal by the exact same `Arc`).

use std::future::Future;

use crate::emitter::Listener;
use crate::error::Error;
use crate::event::{EventKind, ParticipantPayload};
use crate::id::EntityId;
use crate::types::{
    CreateThreadRequest, DeviceInfo, MessageRecord, Page, PageRequest, SendMessageRequest,
    SendMessageResult, ThreadInfo,
};

/// Session-level client: thread management, realtime notifications,
/// device enumeration, and calls.
pub trait SessionSdk: Send + Sync + 'static {
    /// Raw per-thread handle type.
    type Thread: ThreadSdk;

    /// Build a raw handle for `thread_id`. Cheap and side-effect free;
    /// each call may return a distinct object.
    fn thread(&self, thread_id: &EntityId) -> Self::Thread;

    fn create_thread(
        &self,
        request: CreateThreadRequest,
    ) -> impl Future<Output = Result<ThreadInfo, Error>> + Send;

    fn delete_thread(&self, thread_id: &EntityId)
    -> impl Future<Output = Result<(), Error>> + Send;

    fn list_threads(
        &self,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<ThreadInfo>, Error>> + Send;

    fn start_realtime_notifications(&self) -> impl Future<Output = Result<(), Error>> + Send;

    fn stop_realtime_notifications(&self) -> impl Future<Output = Result<(), Error>> + Send;

    fn list_devices(&self) -> impl Future<Output = Result<Vec<DeviceInfo>, Error>> + Send;

    fn join_call(&self, call_id: &EntityId) -> impl Future<Output = Result<(), Error>> + Send;

    fn leave_call(&self, call_id: &EntityId) -> impl Future<Output = Result<(), Error>> + Send;

    /// Attach a listener to the raw event feed.
    fn on(&self, kind: EventKind, listener: Listener);

    /// Detach a listener previously passed to [`on`](Self::on).
    fn off(&self, kind: EventKind, listener: &Listener);
}

/// Thread-scoped client obtained from [`SessionSdk::thread`].
pub trait ThreadSdk: Send + Sync + 'static {
    fn thread_id(&self) -> &EntityId;

    fn send_message(
        &self,
        request: SendMessageRequest,
    ) -> impl Future<Output = Result<SendMessageResult, Error>> + Send;

    fn update_topic(&self, topic: &str) -> impl Future<Output = Result<(), Error>> + Send;

    fn add_participants(
        &self,
        participants: Vec<ParticipantPayload>,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn remove_participant(
        &self,
        participant_id: &EntityId,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    fn send_typing_notification(&self) -> impl Future<Output = Result<(), Error>> + Send;

    /// Page through message history, newest first.
    fn list_messages(
        &self,
        page: PageRequest,
    ) -> impl Future<Output = Result<Page<MessageRecord>, Error>> + Send;
}
