// ── Per-thread proxy ──

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use futures_core::Stream;
use tracing::debug;

use chorus_sdk::{
    EntityId, EventEmitter, EventKind, Listener, MessageKind, MessageRecord, PageRequest,
    ParticipantPayload, SdkEvent, SendMessageRequest, SendMessageResult, SessionSdk, ThreadSdk,
};

use super::ClientInner;
use crate::error::CoreError;
use crate::handle::Handle;
use crate::model::{Message, MessageStatus, OperationCategory};
use crate::store::Instruction;

/// Stateful proxy for one chat thread.
///
/// Obtained from [`SyncClient::get_thread_client`](super::SyncClient::get_thread_client);
/// the client caches one per thread id. Operations commit their optimistic
/// and authoritative effects to the shared store.
pub struct ThreadClient<S: SessionSdk> {
    id: EntityId,
    raw: S::Thread,
    client: Weak<ClientInner<S>>,
    emitter: EventEmitter,
    disposed: AtomicBool,
}

impl<S: SessionSdk> ThreadClient<S> {
    pub(super) fn new(id: EntityId, raw: S::Thread, client: Weak<ClientInner<S>>) -> Self {
        Self {
            id,
            raw,
            client,
            emitter: EventEmitter::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn live(&self) -> Result<Arc<ClientInner<S>>, CoreError> {
        if self.is_disposed() {
            return Err(CoreError::Disposed);
        }
        let client = self.client.upgrade().ok_or(CoreError::Disposed)?;
        client.ensure_live()?;
        Ok(client)
    }

    // ── Messages ─────────────────────────────────────────────────────

    /// Send a message. A `Pending` copy is committed before the SDK is
    /// awaited; it becomes `Confirmed` on success and `Failed` on error.
    pub async fn send_message(
        &self,
        content: &str,
        kind: MessageKind,
    ) -> Result<SendMessageResult, CoreError> {
        let client = self.live()?;
        let message = Message::pending(
            EntityId::generate(),
            client.config.user_id.clone(),
            client.config.display_name.clone(),
            content.to_owned(),
            kind,
        );
        let message_id = message.id.clone();
        client.store.commit(Instruction::AddPendingMessage {
            conversation_id: self.id.clone(),
            message,
        });
        debug!(thread = %self.id, message = %message_id, "optimistic message added");

        self.deliver(&client, message_id, content.to_owned(), kind)
            .await
    }

    /// Re-send a message whose previous send failed, under the same id.
    pub async fn retry_message(&self, message_id: &EntityId) -> Result<SendMessageResult, CoreError> {
        let client = self.live()?;
        let (content, kind) = {
            let state = client.store.get_state();
            let message = state
                .conversation(&self.id)
                .and_then(|c| c.message(message_id))
                .ok_or_else(|| CoreError::NotFound {
                    entity_type: "message".into(),
                    identifier: message_id.to_string(),
                })?;
            if message.status != MessageStatus::Failed {
                return Err(CoreError::InvalidRequest {
                    message: format!(
                        "message {message_id} is {:?}; only failed messages can be retried",
                        message.status
                    ),
                });
            }
            (message.content.clone(), message.kind)
        };

        client.store.commit(Instruction::RetryMessage {
            conversation_id: self.id.clone(),
            message_id: message_id.clone(),
        });
        debug!(thread = %self.id, message = %message_id, "retrying message");
        self.deliver(&client, message_id.clone(), content, kind).await
    }

    async fn deliver(
        &self,
        client: &ClientInner<S>,
        message_id: EntityId,
        content: String,
        kind: MessageKind,
    ) -> Result<SendMessageResult, CoreError> {
        let request = SendMessageRequest {
            id: message_id.clone(),
            content,
            kind,
            sender_display_name: client.config.display_name.clone(),
        };
        match self.raw.send_message(request).await {
            Ok(result) => {
                // Sequence 0 loses to any echo the service already delivered.
                client.succeed(
                    OperationCategory::SendMessage,
                    Some(Instruction::AdvanceMessageStatus {
                        conversation_id: self.id.clone(),
                        message_id,
                        status: MessageStatus::Confirmed,
                        sequence: 0,
                    }),
                );
                Ok(result)
            }
            Err(err) => {
                client.store.commit(Instruction::FailMessage {
                    conversation_id: self.id.clone(),
                    message_id,
                });
                Err(client.fail(OperationCategory::SendMessage, &err).await)
            }
        }
    }

    /// Page through the thread's history, newest first, upserting every
    /// page into state as confirmed messages. Restarts on every call.
    pub fn list_messages(
        self: &Arc<Self>,
    ) -> impl Stream<Item = Result<MessageRecord, CoreError>> + Send + use<S> {
        let this = Arc::clone(self);
        async_stream::stream! {
            let client = match this.live() {
                Ok(client) => client,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };
            let page_size = client.config.page_size;
            let mut request = PageRequest::first(page_size);
            loop {
                let page = match this.raw.list_messages(request).await {
                    Ok(page) => page,
                    Err(err) => {
                        yield Err(client.fail(OperationCategory::ListMessages, &err).await);
                        return;
                    }
                };
                let upserts = page
                    .items
                    .iter()
                    .map(|record| Instruction::UpsertMessage {
                        conversation_id: this.id.clone(),
                        message: record.message.clone(),
                        status: MessageStatus::Confirmed,
                        sequence: record.sequence,
                    })
                    .collect();
                client.succeed(OperationCategory::ListMessages, Some(Instruction::Batch(upserts)));

                let next = page.continuation_token;
                for record in page.items {
                    yield Ok(record);
                }
                match next {
                    Some(token) => request = PageRequest::next(page_size, token),
                    None => break,
                }
            }
        }
    }

    // ── Thread properties ────────────────────────────────────────────

    pub async fn update_topic(&self, topic: &str) -> Result<(), CoreError> {
        let client = self.live()?;
        match self.raw.update_topic(topic).await {
            Ok(()) => {
                client.succeed(
                    OperationCategory::UpdateThread,
                    Some(Instruction::UpdateTopic {
                        conversation_id: self.id.clone(),
                        topic: Some(topic.to_owned()),
                        sequence: None,
                    }),
                );
                Ok(())
            }
            Err(err) => Err(client.fail(OperationCategory::UpdateThread, &err).await),
        }
    }

    /// Participants appear in state once the service reports them.
    pub async fn add_participants(
        &self,
        participants: Vec<ParticipantPayload>,
    ) -> Result<(), CoreError> {
        let client = self.live()?;
        match self.raw.add_participants(participants).await {
            Ok(()) => {
                client.succeed(OperationCategory::UpdateThread, None);
                Ok(())
            }
            Err(err) => Err(client.fail(OperationCategory::UpdateThread, &err).await),
        }
    }

    pub async fn remove_participant(&self, participant_id: &EntityId) -> Result<(), CoreError> {
        let client = self.live()?;
        match self.raw.remove_participant(participant_id).await {
            Ok(()) => {
                client.succeed(OperationCategory::UpdateThread, None);
                Ok(())
            }
            Err(err) => Err(client.fail(OperationCategory::UpdateThread, &err).await),
        }
    }

    pub async fn send_typing_notification(&self) -> Result<(), CoreError> {
        let client = self.live()?;
        match self.raw.send_typing_notification().await {
            Ok(()) => {
                client.succeed(OperationCategory::UpdateThread, None);
                Ok(())
            }
            Err(err) => Err(client.fail(OperationCategory::UpdateThread, &err).await),
        }
    }

    // ── Listeners ────────────────────────────────────────────────────

    /// Listen to raw events of this thread only.
    pub fn on(&self, kind: EventKind, listener: Listener) -> bool {
        if self.is_disposed() {
            return false;
        }
        self.emitter.on(kind, listener)
    }

    pub fn off(&self, kind: EventKind, listener: &Listener) -> bool {
        self.emitter.off(kind, listener)
    }

    pub(super) fn dispatch(&self, event: &SdkEvent) {
        if !self.is_disposed() {
            self.emitter.emit(event);
        }
    }
}

impl<S: SessionSdk> Handle for ThreadClient<S> {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let listeners = self.emitter.clear();
        debug!(thread = %self.id, listeners, "thread client disposed");
    }
}

impl<S: SessionSdk> std::fmt::Debug for ThreadClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadClient")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
