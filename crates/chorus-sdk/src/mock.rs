//! In-memory session SDK for tests and local development.
//!
//! [`MockSession`] implements [`SessionSdk`] entirely in memory. It never
//! emits events on its own: tests drive the feed explicitly with
//! [`MockSession::emit`], which makes ordering and duplication scenarios
//! deterministic. Failures are injected per operation with
//! [`MockSession::fail_next`], and sends can be held open with
//! [`MockSession::hold_sends`] to observe optimistic state.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use chrono::Utc;
use indexmap::IndexMap;
use parking_lot::Mutex;
use strum::Display;
use tokio::sync::watch;
use tracing::debug;

use crate::emitter::{EventEmitter, Listener};
use crate::error::Error;
use crate::event::{EventKind, ParticipantPayload, SdkEvent};
use crate::id::EntityId;
use crate::session::{SessionSdk, ThreadSdk};
use crate::types::{
    CreateThreadRequest, DeviceInfo, MessageRecord, Page, PageRequest, SendMessageRequest,
    SendMessageResult, ThreadInfo,
};

/// Every operation the mock can record or fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum MockOperation {
    CreateThread,
    DeleteThread,
    ListThreads,
    StartNotifications,
    StopNotifications,
    ListDevices,
    JoinCall,
    LeaveCall,
    SendMessage,
    UpdateTopic,
    AddParticipants,
    RemoveParticipant,
    SendTyping,
    ListMessages,
}

struct MockState {
    emitter: EventEmitter,
    threads: Mutex<IndexMap<EntityId, ThreadInfo>>,
    history: Mutex<HashMap<EntityId, Vec<MessageRecord>>>,
    devices: Mutex<Vec<DeviceInfo>>,
    failures: Mutex<HashMap<MockOperation, VecDeque<Error>>>,
    calls: Mutex<Vec<MockOperation>>,
    sent: Mutex<Vec<(EntityId, SendMessageRequest)>>,
    next_thread: AtomicU64,
    sequence: AtomicU64,
    realtime: AtomicBool,
    raw_threads_built: AtomicUsize,
    hold_sends: watch::Sender<bool>,
}

impl MockState {
    fn new() -> Self {
        let (hold_sends, _) = watch::channel(false);
        Self {
            emitter: EventEmitter::new(),
            threads: Mutex::new(IndexMap::new()),
            history: Mutex::new(HashMap::new()),
            devices: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            next_thread: AtomicU64::new(1),
            sequence: AtomicU64::new(0),
            realtime: AtomicBool::new(false),
            raw_threads_built: AtomicUsize::new(0),
            hold_sends,
        }
    }

    /// Record the call and pop an injected failure, if any.
    fn begin(&self, op: MockOperation) -> Result<(), Error> {
        self.calls.lock().push(op);
        let injected = self
            .failures
            .lock()
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        match injected {
            Some(err) => {
                debug!(%op, error = %err, "mock: injected failure");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Page `items` using the offset-as-token convention.
fn paginate<T: Clone>(items: &[T], page: &PageRequest) -> Result<Page<T>, Error> {
    let offset = match page.continuation_token.as_deref() {
        None => 0,
        Some(token) => token.parse::<usize>().map_err(|_| Error::Deserialization {
            message: "invalid continuation token".into(),
            body: token.to_owned(),
        })?,
    };
    let size = usize::try_from(page.max_page_size.max(1)).unwrap_or(usize::MAX);
    let end = offset.saturating_add(size).min(items.len());
    let slice = items.get(offset..end).unwrap_or_default().to_vec();
    let continuation_token = (end < items.len()).then(|| end.to_string());
    Ok(Page {
        items: slice,
        continuation_token,
    })
}

// ── MockSession ──────────────────────────────────────────────────────

/// Cheaply cloneable in-memory session. Clones share state.
#[derive(Clone)]
pub struct MockSession {
    state: Arc<MockState>,
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockState::new()),
        }
    }

    /// Deliver `event` to every listener attached for its kind.
    pub fn emit(&self, event: &SdkEvent) -> usize {
        self.state.emitter.emit(event)
    }

    /// Hand out the next service sequence number.
    pub fn next_sequence(&self) -> u64 {
        self.state.next_sequence()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.state.emitter.listener_count(kind)
    }

    pub fn total_listeners(&self) -> usize {
        self.state.emitter.total_listeners()
    }

    /// Make the next call to `op` fail with `err`. Queues if called twice.
    pub fn fail_next(&self, op: MockOperation, err: Error) {
        self.state
            .failures
            .lock()
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Every operation invoked so far, in call order.
    pub fn calls(&self) -> Vec<MockOperation> {
        self.state.calls.lock().clone()
    }

    pub fn call_count(&self, op: MockOperation) -> usize {
        self.state.calls.lock().iter().filter(|c| **c == op).count()
    }

    /// Messages accepted by `send_message`, with their thread id.
    pub fn sent_messages(&self) -> Vec<(EntityId, SendMessageRequest)> {
        self.state.sent.lock().clone()
    }

    pub fn insert_thread(&self, info: ThreadInfo) {
        self.state.threads.lock().insert(info.id.clone(), info);
    }

    pub fn set_history(&self, thread_id: &EntityId, records: Vec<MessageRecord>) {
        self.state.history.lock().insert(thread_id.clone(), records);
    }

    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        *self.state.devices.lock() = devices;
    }

    pub fn realtime_active(&self) -> bool {
        self.state.realtime.load(Ordering::SeqCst)
    }

    /// How many raw thread handles have been built via [`SessionSdk::thread`].
    pub fn raw_threads_built(&self) -> usize {
        self.state.raw_threads_built.load(Ordering::SeqCst)
    }

    /// Park every `send_message` call until [`release_sends`](Self::release_sends).
    pub fn hold_sends(&self) {
        self.state.hold_sends.send_replace(true);
    }

    pub fn release_sends(&self) {
        self.state.hold_sends.send_replace(false);
    }
}

impl SessionSdk for MockSession {
    type Thread = MockThread;

    fn thread(&self, thread_id: &EntityId) -> MockThread {
        self.state.raw_threads_built.fetch_add(1, Ordering::SeqCst);
        MockThread {
            id: thread_id.clone(),
            state: Arc::clone(&self.state),
        }
    }

    async fn create_thread(&self, request: CreateThreadRequest) -> Result<ThreadInfo, Error> {
        self.state.begin(MockOperation::CreateThread)?;
        let n = self.state.next_thread.fetch_add(1, Ordering::SeqCst);
        let info = ThreadInfo {
            id: EntityId::from(format!("t{n}")),
            topic: Some(request.topic),
            created_on: Some(Utc::now()),
            sequence: self.state.next_sequence(),
        };
        self.insert_thread(info.clone());
        Ok(info)
    }

    async fn delete_thread(&self, thread_id: &EntityId) -> Result<(), Error> {
        self.state.begin(MockOperation::DeleteThread)?;
        self.state
            .threads
            .lock()
            .shift_remove(thread_id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound {
                resource: format!("thread {thread_id}"),
            })
    }

    async fn list_threads(&self, page: PageRequest) -> Result<Page<ThreadInfo>, Error> {
        self.state.begin(MockOperation::ListThreads)?;
        let threads: Vec<ThreadInfo> = self.state.threads.lock().values().cloned().collect();
        paginate(&threads, &page)
    }

    async fn start_realtime_notifications(&self) -> Result<(), Error> {
        self.state.begin(MockOperation::StartNotifications)?;
        self.state.realtime.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_realtime_notifications(&self) -> Result<(), Error> {
        self.state.begin(MockOperation::StopNotifications)?;
        self.state.realtime.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn list_devices(&self) -> Result<Vec<DeviceInfo>, Error> {
        self.state.begin(MockOperation::ListDevices)?;
        Ok(self.state.devices.lock().clone())
    }

    async fn join_call(&self, _call_id: &EntityId) -> Result<(), Error> {
        self.state.begin(MockOperation::JoinCall)
    }

    async fn leave_call(&self, _call_id: &EntityId) -> Result<(), Error> {
        self.state.begin(MockOperation::LeaveCall)
    }

    fn on(&self, kind: EventKind, listener: Listener) {
        self.state.emitter.on(kind, listener);
    }

    fn off(&self, kind: EventKind, listener: &Listener) {
        self.state.emitter.off(kind, listener);
    }
}

// ── MockThread ───────────────────────────────────────────────────────

pub struct MockThread {
    id: EntityId,
    state: Arc<MockState>,
}

impl ThreadSdk for MockThread {
    fn thread_id(&self) -> &EntityId {
        &self.id
    }

    async fn send_message(&self, request: SendMessageRequest) -> Result<SendMessageResult, Error> {
        let mut held = self.state.hold_sends.subscribe();
        if held.wait_for(|hold| !*hold).await.is_err() {
            return Err(Error::ChannelClosed {
                reason: "mock session dropped".into(),
            });
        }
        self.state.begin(MockOperation::SendMessage)?;
        let result = SendMessageResult {
            id: request.id.clone(),
            created_on: Utc::now(),
        };
        self.state.sent.lock().push((self.id.clone(), request));
        Ok(result)
    }

    async fn update_topic(&self, _topic: &str) -> Result<(), Error> {
        self.state.begin(MockOperation::UpdateTopic)
    }

    async fn add_participants(&self, _participants: Vec<ParticipantPayload>) -> Result<(), Error> {
        self.state.begin(MockOperation::AddParticipants)
    }

    async fn remove_participant(&self, _participant_id: &EntityId) -> Result<(), Error> {
        self.state.begin(MockOperation::RemoveParticipant)
    }

    async fn send_typing_notification(&self) -> Result<(), Error> {
        self.state.begin(MockOperation::SendTyping)
    }

    async fn list_messages(&self, page: PageRequest) -> Result<Page<MessageRecord>, Error> {
        self.state.begin(MockOperation::ListMessages)?;
        let records = self
            .state
            .history
            .lock()
            .get(&self.id)
            .cloned()
            .unwrap_or_default();
        paginate(&records, &page)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn create_thread_assigns_sequential_ids() {
        let session = MockSession::new();
        let first = session
            .create_thread(CreateThreadRequest {
                topic: "standup".into(),
                participants: Vec::new(),
            })
            .await
            .unwrap();
        let second = session
            .create_thread(CreateThreadRequest::default())
            .await
            .unwrap();

        assert_eq!(first.id, EntityId::from("t1"));
        assert_eq!(second.id, EntityId::from("t2"));
        assert!(second.sequence > first.sequence);
    }

    #[tokio::test]
    async fn injected_failure_applies_once() {
        let session = MockSession::new();
        session.fail_next(MockOperation::ListDevices, Error::Timeout { timeout_secs: 3 });

        assert!(session.list_devices().await.is_err());
        assert!(session.list_devices().await.is_ok());
        assert_eq!(session.call_count(MockOperation::ListDevices), 2);
    }

    #[tokio::test]
    async fn list_threads_pages_until_exhausted() {
        let session = MockSession::new();
        for _ in 0..5 {
            session
                .create_thread(CreateThreadRequest::default())
                .await
                .unwrap();
        }

        let first = session.list_threads(PageRequest::first(2)).await.unwrap();
        assert_eq!(first.items.len(), 2);
        let token = first.continuation_token.unwrap();

        let second = session
            .list_threads(PageRequest::next(2, token))
            .await
            .unwrap();
        let third = session
            .list_threads(PageRequest::next(2, second.continuation_token.unwrap()))
            .await
            .unwrap();
        assert_eq!(third.items.len(), 1);
        assert!(third.is_last());
    }

    #[tokio::test]
    async fn deleting_unknown_thread_is_not_found() {
        let session = MockSession::new();
        let err = session
            .delete_thread(&EntityId::from("missing"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn held_send_stays_pending_until_released() {
        let session = MockSession::new();
        let thread = session.thread(&EntityId::from("t1"));
        session.hold_sends();

        let mut send = tokio_test::task::spawn(thread.send_message(SendMessageRequest {
            id: EntityId::generate(),
            content: "hello".into(),
            kind: crate::MessageKind::Text,
            sender_display_name: None,
        }));
        tokio_test::assert_pending!(send.poll());
        assert!(session.sent_messages().is_empty());

        session.release_sends();
        assert!(send.is_woken());
        tokio_test::assert_ready_ok!(send.poll());
        assert_eq!(session.sent_messages().len(), 1);
    }
}
