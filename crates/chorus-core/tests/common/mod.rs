// Shared fixtures for chorus-core integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tracing_subscriber::EnvFilter;

use chorus_core::{StateHandler, SyncClient, SyncConfig};
use chorus_sdk::mock::MockSession;
use chorus_sdk::{EntityId, Listener, MessageKind, MessagePayload, ParticipantPayload, SdkEvent};

pub const LOCAL_USER: &str = "alice";

/// Route `tracing` output through the test harness. Set `RUST_LOG` to see it.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn config() -> SyncConfig {
    SyncConfig::new(LOCAL_USER).with_display_name("Alice")
}

pub fn setup() -> (MockSession, SyncClient<MockSession>) {
    setup_with(config())
}

pub fn setup_with(config: SyncConfig) -> (MockSession, SyncClient<MockSession>) {
    init_tracing();
    let session = MockSession::new();
    let client = SyncClient::new(session.clone(), config);
    (session, client)
}

pub fn id(raw: &str) -> EntityId {
    EntityId::from(raw)
}

// ── Event builders ──────────────────────────────────────────────────

pub fn payload(message_id: &EntityId, sender: &str, content: &str) -> MessagePayload {
    MessagePayload {
        id: message_id.clone(),
        sender_id: Some(id(sender)),
        sender_display_name: Some(sender.to_owned()),
        content: content.to_owned(),
        kind: MessageKind::Text,
        created_on: Utc::now(),
    }
}

pub fn message_received(thread: &str, message: MessagePayload, sequence: u64) -> SdkEvent {
    SdkEvent::MessageReceived {
        thread_id: id(thread),
        message,
        sequence,
    }
}

pub fn thread_created(thread: &str, sequence: u64) -> SdkEvent {
    SdkEvent::ThreadCreated {
        thread_id: id(thread),
        topic: Some(format!("{thread} topic")),
        created_on: Some(Utc::now()),
        sequence,
    }
}

pub fn participant_added(thread: &str, participant: &str, name: &str, sequence: u64) -> SdkEvent {
    SdkEvent::ParticipantAdded {
        thread_id: id(thread),
        participant: ParticipantPayload {
            id: id(participant),
            display_name: Some(name.to_owned()),
            presence: chorus_sdk::PresenceState::Connected,
        },
        sequence,
    }
}

pub fn typing(thread: &str, sender: &str, received_on: DateTime<Utc>, sequence: u64) -> SdkEvent {
    SdkEvent::TypingIndicatorReceived {
        thread_id: id(thread),
        sender_id: id(sender),
        received_on,
        sequence,
    }
}

// ── Counters ────────────────────────────────────────────────────────

pub fn counting_handler() -> (StateHandler, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let handler: StateHandler = Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (handler, hits)
}

pub fn counting_listener() -> (Listener, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let listener: Listener = Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    (listener, hits)
}

pub fn hits(counter: &AtomicUsize) -> usize {
    counter.load(Ordering::SeqCst)
}
