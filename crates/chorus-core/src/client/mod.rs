// ── Adapter proxy ──
//
// `SyncClient` owns the session SDK and is the only path by which SDK
// events and operation results reach the state store. SDK listeners hold
// a `Weak` back-reference, so dropping every `SyncClient` clone frees the
// client even if the application forgets to call `dispose`.

mod call;
mod thread;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use futures_core::Stream;
use parking_lot::Mutex;
use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use chorus_sdk::{
    ConnectionStatus, CreateThreadRequest, DeviceInfo, EntityId, EventEmitter, EventKind, Listener,
    PageRequest, SdkEvent, SessionSdk, ThreadInfo,
};

use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::handle::HandleCache;
use crate::model::{
    ConversationKind, DiagnosticError, DiagnosticKind, OperationCategory, RootState,
};
use crate::select::{Bindings, ComponentKey, Props};
use crate::store::{Instruction, StateHandler, StateStore};
use crate::stream::StateStream;
use crate::translate::translate;

pub use call::CallHandle;
pub use thread::ThreadClient;

// ── SyncClient ───────────────────────────────────────────────────────

/// Stateful wrapper around a [`SessionSdk`].
///
/// Cheap to clone; clones share the same store, caches and listeners.
/// Every SDK event is translated and committed before raw listeners
/// attached with [`on`](Self::on) see it. The one exception is an event
/// the SDK delivers from inside a state handler: its commit is queued
/// behind the one being applied, so its raw listeners run first and see
/// the snapshot from before the event. The commit lands as soon as the
/// outer handlers return.
pub struct SyncClient<S: SessionSdk> {
    inner: Arc<ClientInner<S>>,
}

impl<S: SessionSdk> Clone for SyncClient<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ClientInner<S: SessionSdk> {
    sdk: S,
    config: SyncConfig,
    store: StateStore,
    bindings: Bindings,
    threads: HandleCache<ThreadClient<S>>,
    calls: HandleCache<CallHandle<S>>,
    /// Raw-event listeners attached through the proxy.
    emitter: EventEmitter,
    /// The one listener attached to the SDK for every event kind.
    sdk_listener: Mutex<Option<Listener>>,
    /// Serializes start/stop of realtime notifications.
    realtime_gate: tokio::sync::Mutex<()>,
    /// Token of the running typing sweeper. `Some` while realtime
    /// notifications are active.
    sweeper: Mutex<Option<CancellationToken>>,
    shutdown: CancellationToken,
    disposed: AtomicBool,
}

impl<S: SessionSdk> SyncClient<S> {
    /// Wrap `sdk` and attach to its event feed.
    pub fn new(sdk: S, config: SyncConfig) -> Self {
        let bindings = Bindings::new(config.user_id.clone());
        let inner = Arc::new(ClientInner {
            sdk,
            config,
            store: StateStore::new(),
            bindings,
            threads: HandleCache::new(),
            calls: HandleCache::new(),
            emitter: EventEmitter::new(),
            sdk_listener: Mutex::new(None),
            realtime_gate: tokio::sync::Mutex::new(()),
            sweeper: Mutex::new(None),
            shutdown: CancellationToken::new(),
            disposed: AtomicBool::new(false),
        });

        let weak = Arc::downgrade(&inner);
        let listener: Listener = Arc::new(move |event: &SdkEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.handle_event(event);
            }
        });
        for kind in EventKind::iter() {
            inner.sdk.on(kind, Arc::clone(&listener));
        }
        *inner.sdk_listener.lock() = Some(listener);
        debug!(user = %inner.config.user_id, "sync client attached to session");

        Self { inner }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    /// Direct access to the wrapped SDK.
    pub fn sdk(&self) -> &S {
        &self.inner.sdk
    }

    // ── State access ─────────────────────────────────────────────────

    pub fn get_state(&self) -> Arc<RootState> {
        self.inner.store.get_state()
    }

    /// Register `handler` to run after every applied commit. Returns
    /// `false` if this exact handler is already registered.
    pub fn on_state_change(&self, handler: StateHandler) -> bool {
        if self.inner.is_disposed() {
            return false;
        }
        self.inner.store.on_state_change(handler)
    }

    pub fn off_state_change(&self, handler: &StateHandler) -> bool {
        self.inner.store.off_state_change(handler)
    }

    /// Async view of the state, for consumers living on a runtime.
    pub fn subscribe(&self) -> StateStream {
        self.inner.store.subscribe()
    }

    /// Memoized props for one bound component, computed against the
    /// current snapshot.
    pub fn select(&self, key: &ComponentKey) -> Props {
        self.inner
            .bindings
            .select(&self.inner.store.get_state(), key)
    }

    // ── Raw event listeners ──────────────────────────────────────────

    pub fn on(&self, kind: EventKind, listener: Listener) -> bool {
        if self.inner.is_disposed() {
            return false;
        }
        self.inner.emitter.on(kind, listener)
    }

    pub fn off(&self, kind: EventKind, listener: &Listener) -> bool {
        self.inner.emitter.off(kind, listener)
    }

    // ── Handles ──────────────────────────────────────────────────────

    /// The thread client for `thread_id`. Repeated calls return the same
    /// `Arc` until the thread is deleted or the client disposed.
    pub fn get_thread_client(&self, thread_id: &EntityId) -> Result<Arc<ThreadClient<S>>, CoreError> {
        self.inner.ensure_live()?;
        require_id(thread_id, "thread")?;
        let handle = self.inner.threads.get_or_create(thread_id, || {
            ThreadClient::new(
                thread_id.clone(),
                self.inner.sdk.thread(thread_id),
                Arc::downgrade(&self.inner),
            )
        });
        if self.inner.is_disposed() {
            self.inner.threads.evict(thread_id);
            return Err(CoreError::Disposed);
        }
        Ok(handle)
    }

    /// The call handle for `call_id`, with the same identity guarantees
    /// as [`get_thread_client`](Self::get_thread_client).
    pub fn get_call_handle(&self, call_id: &EntityId) -> Result<Arc<CallHandle<S>>, CoreError> {
        self.inner.ensure_live()?;
        require_id(call_id, "call")?;
        let handle = self.inner.calls.get_or_create(call_id, || {
            CallHandle::new(call_id.clone(), Arc::downgrade(&self.inner))
        });
        if self.inner.is_disposed() {
            self.inner.calls.evict(call_id);
            return Err(CoreError::Disposed);
        }
        Ok(handle)
    }

    // ── Thread management ────────────────────────────────────────────

    pub async fn create_thread(&self, request: CreateThreadRequest) -> Result<ThreadInfo, CoreError> {
        self.inner.ensure_live()?;
        match self.inner.sdk.create_thread(request).await {
            Ok(thread) => {
                self.inner.succeed(
                    OperationCategory::CreateThread,
                    Some(thread_upsert(&thread)),
                );
                info!(thread = %thread.id, "thread created");
                Ok(thread)
            }
            Err(err) => Err(self.inner.fail(OperationCategory::CreateThread, &err).await),
        }
    }

    /// Delete a thread. On success the conversation is removed and
    /// tombstoned, and its cached handles are disposed.
    ///
    /// The tombstone sits at `u64::MAX`: thread ids are never reused, so
    /// nothing the service sends afterwards for this id can bring the
    /// conversation back, including events already in flight.
    pub async fn delete_thread(&self, thread_id: &EntityId) -> Result<(), CoreError> {
        self.inner.ensure_live()?;
        require_id(thread_id, "thread")?;
        match self.inner.sdk.delete_thread(thread_id).await {
            Ok(()) => {
                self.inner.succeed(
                    OperationCategory::DeleteThread,
                    Some(Instruction::RemoveConversation {
                        id: thread_id.clone(),
                        sequence: u64::MAX,
                    }),
                );
                self.inner.forget(thread_id);
                info!(thread = %thread_id, "thread deleted");
                Ok(())
            }
            Err(err) => Err(self.inner.fail(OperationCategory::DeleteThread, &err).await),
        }
    }

    /// Page through every thread the user belongs to.
    ///
    /// The stream is lazy and finite. Each call starts again from the
    /// first page. Every page is committed before its threads are yielded.
    /// On failure the error is yielded once and the stream ends.
    pub fn list_threads(
        &self,
    ) -> impl Stream<Item = Result<ThreadInfo, CoreError>> + Send + use<S> {
        let inner = Arc::clone(&self.inner);
        async_stream::stream! {
            if let Err(err) = inner.ensure_live() {
                yield Err(err);
                return;
            }
            let page_size = inner.config.page_size;
            let mut request = PageRequest::first(page_size);
            loop {
                let page = match inner.sdk.list_threads(request).await {
                    Ok(page) => page,
                    Err(err) => {
                        yield Err(inner.fail(OperationCategory::ListThreads, &err).await);
                        return;
                    }
                };
                debug!(threads = page.items.len(), last = page.is_last(), "thread page received");
                inner.succeed(
                    OperationCategory::ListThreads,
                    Some(Instruction::Batch(page.items.iter().map(thread_upsert).collect())),
                );
                let next = page.continuation_token;
                for thread in page.items {
                    yield Ok(thread);
                }
                match next {
                    Some(token) => request = PageRequest::next(page_size, token),
                    None => break,
                }
            }
        }
    }

    // ── Realtime notifications ───────────────────────────────────────

    /// Start the SDK's realtime feed and the typing sweeper. Calling it
    /// again while running is a no-op.
    pub async fn start_realtime_notifications(&self) -> Result<(), CoreError> {
        self.inner.ensure_live()?;
        let _gate = self.inner.realtime_gate.lock().await;
        let running = self.inner.sweeper.lock().is_some();
        if running {
            debug!("realtime notifications already running");
            return Ok(());
        }

        self.inner.set_connection(ConnectionStatus::Connecting);
        match self.inner.sdk.start_realtime_notifications().await {
            Ok(()) => {
                let token = self.inner.shutdown.child_token();
                self.inner.spawn_sweeper(token.clone());
                *self.inner.sweeper.lock() = Some(token);
                self.inner.succeed(
                    OperationCategory::Connect,
                    Some(Instruction::SetConnection {
                        status: ConnectionStatus::Connected,
                        sequence: None,
                    }),
                );
                info!("realtime notifications started");
                Ok(())
            }
            Err(err) => {
                self.inner.set_connection(ConnectionStatus::Disconnected);
                Err(self.inner.record_failure(OperationCategory::Connect, &err))
            }
        }
    }

    /// Stop the realtime feed. A no-op if it is not running.
    pub async fn stop_realtime_notifications(&self) -> Result<(), CoreError> {
        self.inner.ensure_live()?;
        self.inner.stop_realtime().await
    }

    pub fn is_realtime_active(&self) -> bool {
        self.inner.sweeper.lock().is_some()
    }

    // ── Devices ──────────────────────────────────────────────────────

    /// Ask the SDK for local media devices and replace the device list.
    pub async fn enumerate_devices(&self) -> Result<Vec<DeviceInfo>, CoreError> {
        self.inner.ensure_live()?;
        match self.inner.sdk.list_devices().await {
            Ok(devices) => {
                self.inner.succeed(
                    OperationCategory::DeviceEnumerate,
                    Some(Instruction::ReplaceDevices {
                        devices: devices.clone(),
                        sequence: None,
                    }),
                );
                debug!(devices = devices.len(), "devices enumerated");
                Ok(devices)
            }
            Err(err) => Err(self.inner.fail(OperationCategory::DeviceEnumerate, &err).await),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Tear the client down. Detaches from the SDK first, then stops the
    /// sweeper, disposes every cached handle, drops all listeners and
    /// handlers, and closes the store. Idempotent.
    pub fn dispose(&self) {
        let inner = &self.inner;
        if inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let listener = inner.sdk_listener.lock().take();
        if let Some(listener) = listener {
            for kind in EventKind::iter() {
                inner.sdk.off(kind, &listener);
            }
        }

        inner.shutdown.cancel();
        let was_realtime = inner.sweeper.lock().take().is_some();
        let threads = inner.threads.clear();
        let calls = inner.calls.clear();
        let listeners = inner.emitter.clear();
        inner.bindings.clear();
        inner.store.close();

        info!(threads, calls, listeners, was_realtime, "sync client disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

impl<S: SessionSdk> std::fmt::Debug for SyncClient<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncClient")
            .field("user", &self.inner.config.user_id)
            .field("version", &self.inner.store.get_state().version)
            .field("threads", &self.inner.threads.len())
            .field("calls", &self.inner.calls.len())
            .field("disposed", &self.inner.is_disposed())
            .finish_non_exhaustive()
    }
}

// ── ClientInner ──────────────────────────────────────────────────────

impl<S: SessionSdk> ClientInner<S> {
    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    fn ensure_live(&self) -> Result<(), CoreError> {
        if self.is_disposed() {
            return Err(CoreError::Disposed);
        }
        Ok(())
    }

    /// Translate, commit, then fan the raw event out to proxy and handle
    /// listeners. Called from inside a state handler, the commit is only
    /// queued when the listeners run.
    fn handle_event(&self, event: &SdkEvent) {
        if self.is_disposed() {
            return;
        }
        if let Some(instruction) = translate(&self.store.get_state(), event) {
            self.store.commit(instruction);
        }

        self.emitter.emit(event);
        if let Some(id) = event.conversation_id() {
            if let Some(thread) = self.threads.get(id) {
                thread.dispatch(event);
            }
            if let Some(call) = self.calls.get(id) {
                call.dispatch(event);
            }
        }

        if let SdkEvent::ThreadDeleted { thread_id, .. } = event {
            if self.store.get_state().conversation(thread_id).is_none() {
                self.forget(thread_id);
            }
        }
    }

    /// Drop everything cached for a conversation that no longer exists.
    fn forget(&self, id: &EntityId) {
        let thread = self.threads.evict(id);
        let call = self.calls.evict(id);
        self.bindings.release(id);
        debug!(%id, thread, call, "conversation handles released");
    }

    /// Commit the effect of a successful operation together with clearing
    /// its category's last error.
    fn succeed(&self, category: OperationCategory, effect: Option<Instruction>) {
        let clear = Instruction::ClearError { category };
        let instruction = match effect {
            Some(effect) => Instruction::Batch(vec![effect, clear]),
            None => clear,
        };
        self.store.commit(instruction);
    }

    /// Classify `err` and record it in diagnostics. `NotFound` is
    /// returned but never recorded.
    fn record_failure(&self, category: OperationCategory, err: &chorus_sdk::Error) -> CoreError {
        let error = CoreError::classify(category, err);
        warn!(%category, error = %error, "operation failed");

        let kind = match &error {
            CoreError::TransientOperation { .. } => Some(DiagnosticKind::Transient),
            CoreError::Authentication { .. } => Some(DiagnosticKind::Authentication),
            CoreError::Rejected { .. } => Some(DiagnosticKind::Rejected),
            _ => None,
        };
        if let Some(kind) = kind {
            self.store.commit(Instruction::RecordError {
                category,
                error: DiagnosticError {
                    kind,
                    message: error.to_string(),
                    occurred_on: Utc::now(),
                },
            });
        }
        error
    }

    /// [`record_failure`](Self::record_failure), and stop realtime
    /// notifications when the credential is no longer accepted.
    async fn fail(&self, category: OperationCategory, err: &chorus_sdk::Error) -> CoreError {
        let error = self.record_failure(category, err);
        if error.is_authentication() {
            if let Err(stop_err) = self.stop_realtime().await {
                warn!(error = %stop_err, "could not stop realtime notifications after auth failure");
            }
        }
        error
    }

    fn set_connection(&self, status: ConnectionStatus) {
        self.store.commit(Instruction::SetConnection {
            status,
            sequence: None,
        });
    }

    /// Stop the SDK feed first; the sweeper and connection state only
    /// change once the SDK confirms. On failure realtime stays active and
    /// a later stop tries again.
    async fn stop_realtime(&self) -> Result<(), CoreError> {
        let _gate = self.realtime_gate.lock().await;
        let running = self.sweeper.lock().is_some();
        if !running {
            return Ok(());
        }

        match self.sdk.stop_realtime_notifications().await {
            Ok(()) => {
                let token = self.sweeper.lock().take();
                if let Some(token) = token {
                    token.cancel();
                }
                self.set_connection(ConnectionStatus::Disconnected);
                info!("realtime notifications stopped");
                Ok(())
            }
            Err(err) => Err(self.record_failure(OperationCategory::Connect, &err)),
        }
    }

    fn expire_typing(&self) {
        let Ok(ttl) = chrono::Duration::from_std(self.config.typing_indicator_ttl) else {
            return;
        };
        if let Some(older_than) = Utc::now().checked_sub_signed(ttl) {
            self.store.commit(Instruction::ExpireTyping { older_than });
        }
    }

    fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime, typing indicators will not expire");
            return;
        };
        let period = self.config.typing_sweep_interval.max(Duration::from_millis(10));
        runtime.spawn(typing_sweep_task(Arc::downgrade(self), period, cancel));
    }
}

/// Periodically drop typing indicators older than the configured TTL.
async fn typing_sweep_task<S: SessionSdk>(
    client: Weak<ClientInner<S>>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let Some(client) = client.upgrade() else {
                    break;
                };
                client.expire_typing();
            }
        }
    }
    debug!("typing sweeper stopped");
}

fn thread_upsert(thread: &ThreadInfo) -> Instruction {
    Instruction::UpsertConversation {
        id: thread.id.clone(),
        kind: ConversationKind::Chat,
        topic: thread.topic.clone(),
        created_on: thread.created_on,
        sequence: thread.sequence,
    }
}

fn require_id(id: &EntityId, what: &str) -> Result<(), CoreError> {
    if id.is_empty() {
        return Err(CoreError::InvalidRequest {
            message: format!("{what} id is empty"),
        });
    }
    Ok(())
}
