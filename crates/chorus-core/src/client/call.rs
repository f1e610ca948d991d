// ── Per-call proxy ──

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::debug;

use chorus_sdk::{EntityId, EventEmitter, EventKind, Listener, SdkEvent, SessionSdk};

use super::ClientInner;
use crate::error::CoreError;
use crate::handle::Handle;
use crate::model::{ConversationKind, ConversationStatus, OperationCategory};
use crate::store::Instruction;

/// Stateful handle for one call.
pub struct CallHandle<S: SessionSdk> {
    id: EntityId,
    client: Weak<ClientInner<S>>,
    emitter: EventEmitter,
    disposed: AtomicBool,
}

impl<S: SessionSdk> CallHandle<S> {
    pub(super) fn new(id: EntityId, client: Weak<ClientInner<S>>) -> Self {
        Self {
            id,
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

    /// Current status of the call in state, if it is known.
    pub fn status(&self) -> Option<ConversationStatus> {
        let client = self.client.upgrade()?;
        let state = client.store.get_state();
        state.conversation(&self.id).map(|c| c.status)
    }

    fn set_status(&self, client: &ClientInner<S>, status: ConversationStatus) {
        client.store.commit(Instruction::SetConversationStatus {
            conversation_id: self.id.clone(),
            kind: ConversationKind::Call,
            status,
            sequence: None,
        });
    }

    /// Join the call. The call shows as `Connecting` until the service
    /// reports otherwise; a failed join leaves it `Disconnected`.
    pub async fn join(&self) -> Result<(), CoreError> {
        let client = self.live()?;
        self.set_status(&client, ConversationStatus::Connecting);
        match client.sdk.join_call(&self.id).await {
            Ok(()) => {
                client.succeed(OperationCategory::Call, None);
                debug!(call = %self.id, "join requested");
                Ok(())
            }
            Err(err) => {
                self.set_status(&client, ConversationStatus::Disconnected);
                Err(client.fail(OperationCategory::Call, &err).await)
            }
        }
    }

    /// Leave the call. On failure the status from before the attempt is
    /// restored.
    pub async fn leave(&self) -> Result<(), CoreError> {
        let client = self.live()?;
        let previous = self.status();
        self.set_status(&client, ConversationStatus::Disconnecting);
        match client.sdk.leave_call(&self.id).await {
            Ok(()) => {
                client.succeed(OperationCategory::Call, None);
                debug!(call = %self.id, "leave requested");
                Ok(())
            }
            Err(err) => {
                if let Some(previous) = previous {
                    self.set_status(&client, previous);
                }
                Err(client.fail(OperationCategory::Call, &err).await)
            }
        }
    }

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

impl<S: SessionSdk> Handle for CallHandle<S> {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        let listeners = self.emitter.clear();
        debug!(call = %self.id, listeners, "call handle disposed");
    }
}

impl<S: SessionSdk> std::fmt::Debug for CallHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandle")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish_non_exhaustive()
    }
}
