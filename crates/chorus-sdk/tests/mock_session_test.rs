// Integration tests for the in-memory `MockSession`.
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_test::{assert_pending, assert_ready, task};

use chorus_sdk::mock::{MockOperation, MockSession};
use chorus_sdk::{
    EntityId, Error, EventKind, Listener, MessageKind, SdkEvent, SendMessageRequest, SessionSdk,
    ThreadSdk,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn counting() -> (Listener, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    let listener: Listener = Arc::new(move |_: &SdkEvent| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    (listener, count)
}

fn request(content: &str) -> SendMessageRequest {
    SendMessageRequest {
        id: EntityId::generate(),
        content: content.into(),
        kind: MessageKind::Text,
        sender_display_name: None,
    }
}

// ── Event feed ──────────────────────────────────────────────────────

#[test]
fn test_feed_reaches_listeners_of_matching_kind() {
    let session = MockSession::new();
    let (created, created_hits) = counting();
    let (deleted, deleted_hits) = counting();
    session.on(EventKind::ThreadCreated, Arc::clone(&created));
    session.on(EventKind::ThreadCreated, Arc::clone(&created));
    session.on(EventKind::ThreadDeleted, deleted);

    let raw = json!({ "kind": "threadCreated", "threadId": "t9", "sequence": 1 });
    let event: SdkEvent = serde_json::from_value(raw).unwrap();

    assert_eq!(session.emit(&event), 1);
    assert_eq!(created_hits.load(Ordering::SeqCst), 1);
    assert_eq!(deleted_hits.load(Ordering::SeqCst), 0);

    session.off(EventKind::ThreadCreated, &created);
    assert_eq!(session.emit(&event), 0);
    assert_eq!(session.listener_count(EventKind::ThreadCreated), 0);
    assert_eq!(session.total_listeners(), 1);
}

#[test]
fn test_sequences_increase_across_calls() {
    let session = MockSession::new();
    let first = session.next_sequence();
    let second = session.next_sequence();
    assert!(second > first);
}

// ── Sends ───────────────────────────────────────────────────────────

#[test]
fn test_held_send_completes_after_release() {
    let session = MockSession::new();
    let thread = session.thread(&EntityId::from("t1"));
    assert_eq!(session.raw_threads_built(), 1);
    session.hold_sends();

    let outgoing = request("hello");
    let expected_id = outgoing.id.clone();
    let mut send = task::spawn(thread.send_message(outgoing));
    assert_pending!(send.poll());
    assert!(session.sent_messages().is_empty());

    session.release_sends();
    assert!(send.is_woken());
    let result = assert_ready!(send.poll()).unwrap();
    assert_eq!(result.id, expected_id);

    let sent = session.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, EntityId::from("t1"));
    assert_eq!(sent[0].1.content, "hello");
}

#[tokio::test]
async fn test_failed_send_is_not_recorded_as_sent() {
    let session = MockSession::new();
    let thread = session.thread(&EntityId::from("t1"));
    session.fail_next(
        MockOperation::SendMessage,
        Error::Service {
            message: "blocked".into(),
            code: Some("BadRequest".into()),
            status: 400,
        },
    );

    let err = thread.send_message(request("nope")).await.unwrap_err();
    assert!(!err.is_transient());
    assert!(session.sent_messages().is_empty());

    thread.send_message(request("yes")).await.unwrap();
    assert_eq!(session.call_count(MockOperation::SendMessage), 2);
    assert_eq!(session.sent_messages().len(), 1);
}

// ── Realtime ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_realtime_flag_follows_start_and_stop() {
    let session = MockSession::new();
    assert!(!session.realtime_active());

    session.start_realtime_notifications().await.unwrap();
    assert!(session.realtime_active());

    session.stop_realtime_notifications().await.unwrap();
    assert!(!session.realtime_active());
    assert_eq!(
        session.calls(),
        vec![MockOperation::StartNotifications, MockOperation::StopNotifications]
    );
}
