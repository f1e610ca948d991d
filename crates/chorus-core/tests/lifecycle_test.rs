// Integration tests for realtime notifications, calls, and client teardown.
#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;

use chorus_core::{
    ConversationKind, ConversationStatus, CoreError, DiagnosticKind, OperationCategory,
    SyncConfig,
};
use chorus_sdk::mock::MockOperation;
use chorus_sdk::{CallStatus, ConnectionStatus, Error, EventKind, MessageKind, SdkEvent};

use common::{
    counting_handler, counting_listener, hits, id, participant_added, setup, setup_with,
    thread_created, typing,
};

// ── Realtime notifications ──────────────────────────────────────────

#[tokio::test]
async fn test_start_and_stop_are_idempotent() {
    let (session, client) = setup();

    client.start_realtime_notifications().await.unwrap();
    client.start_realtime_notifications().await.unwrap();
    assert_eq!(session.call_count(MockOperation::StartNotifications), 1);
    assert!(session.realtime_active());
    assert!(client.is_realtime_active());
    assert_eq!(client.get_state().connection.status, ConnectionStatus::Connected);

    client.stop_realtime_notifications().await.unwrap();
    client.stop_realtime_notifications().await.unwrap();
    assert_eq!(session.call_count(MockOperation::StopNotifications), 1);
    assert!(!session.realtime_active());
    assert_eq!(
        client.get_state().connection.status,
        ConnectionStatus::Disconnected
    );
}

#[tokio::test]
async fn test_start_failure_records_connect_error() {
    let (session, client) = setup();
    session.fail_next(
        MockOperation::StartNotifications,
        Error::ChannelClosed {
            reason: "gateway restart".into(),
        },
    );

    let err = client.start_realtime_notifications().await.unwrap_err();
    assert!(err.is_transient());
    assert!(!client.is_realtime_active());

    let state = client.get_state();
    assert_eq!(state.connection.status, ConnectionStatus::Disconnected);
    assert_eq!(
        state.diagnostics.get(OperationCategory::Connect).unwrap().kind,
        DiagnosticKind::Transient
    );

    client.start_realtime_notifications().await.unwrap();
    assert!(client.get_state().diagnostics.is_empty());
}

#[tokio::test]
async fn test_failed_stop_keeps_realtime_running() {
    let (session, client) = setup();
    client.start_realtime_notifications().await.unwrap();
    session.fail_next(
        MockOperation::StopNotifications,
        Error::Timeout { timeout_secs: 5 },
    );

    let err = client.stop_realtime_notifications().await.unwrap_err();
    assert!(err.is_transient());
    assert!(session.realtime_active());
    assert!(client.is_realtime_active());
    let state = client.get_state();
    assert_eq!(state.connection.status, ConnectionStatus::Connected);
    assert_eq!(
        state.diagnostics.get(OperationCategory::Connect).unwrap().kind,
        DiagnosticKind::Transient
    );

    client.stop_realtime_notifications().await.unwrap();
    assert_eq!(session.call_count(MockOperation::StopNotifications), 2);
    assert!(!session.realtime_active());
    assert!(!client.is_realtime_active());
    assert_eq!(
        client.get_state().connection.status,
        ConnectionStatus::Disconnected
    );
}

#[tokio::test]
async fn test_auth_failure_stops_realtime() {
    let (session, client) = setup();
    session.emit(&thread_created("t1", 1));
    client.start_realtime_notifications().await.unwrap();
    let thread = client.get_thread_client(&id("t1")).unwrap();
    session.fail_next(MockOperation::SendMessage, Error::TokenExpired);

    let err = thread.send_message("hello", MessageKind::Text).await.unwrap_err();
    assert!(err.is_authentication());
    assert!(!session.realtime_active());
    assert!(!client.is_realtime_active());
    assert_eq!(session.call_count(MockOperation::StopNotifications), 1);

    let state = client.get_state();
    assert_eq!(state.connection.status, ConnectionStatus::Disconnected);
    assert_eq!(
        state.diagnostics.get(OperationCategory::SendMessage).unwrap().kind,
        DiagnosticKind::Authentication
    );
}

#[tokio::test]
async fn test_connection_events_are_sequence_gated() {
    let (session, client) = setup();
    let connection = |status, sequence| SdkEvent::ConnectionStateChanged { status, sequence };

    session.emit(&connection(ConnectionStatus::Connected, 4));
    session.emit(&connection(ConnectionStatus::Reconnecting, 3));
    assert_eq!(client.get_state().connection.status, ConnectionStatus::Connected);

    session.emit(&connection(ConnectionStatus::Reconnecting, 5));
    assert_eq!(
        client.get_state().connection.status,
        ConnectionStatus::Reconnecting
    );
}

#[tokio::test(start_paused = true)]
async fn test_typing_indicators_expire_while_realtime_runs() {
    let config = SyncConfig {
        typing_indicator_ttl: Duration::from_secs(8),
        typing_sweep_interval: Duration::from_secs(1),
        ..common::config()
    };
    let (session, client) = setup_with(config);
    session.emit(&thread_created("t1", 1));
    session.emit(&participant_added("t1", "bob", "Bob", 2));
    client.start_realtime_notifications().await.unwrap();

    let long_ago = Utc::now() - chrono::Duration::seconds(30);
    session.emit(&typing("t1", "bob", long_ago, 3));
    session.emit(&typing("t1", "carol", Utc::now(), 4));
    assert_eq!(
        client.get_state().conversation(&id("t1")).unwrap().typing.len(),
        2
    );

    tokio::time::sleep(Duration::from_secs(2)).await;

    let state = client.get_state();
    let indicators = &state.conversation(&id("t1")).unwrap().typing;
    assert_eq!(indicators.len(), 1);
    assert!(indicators.contains_key(&id("carol")));
}

// ── Calls ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_join_call_tracks_status() {
    let (session, client) = setup();
    let call = client.get_call_handle(&id("call-1")).unwrap();
    assert!(Arc::ptr_eq(&call, &client.get_call_handle(&id("call-1")).unwrap()));

    call.join().await.unwrap();
    let state = client.get_state();
    let conversation = state.conversation(&id("call-1")).unwrap();
    assert_eq!(conversation.kind, ConversationKind::Call);
    assert_eq!(conversation.status, ConversationStatus::Connecting);

    session.emit(&SdkEvent::CallStateChanged {
        call_id: id("call-1"),
        status: CallStatus::Connected,
        sequence: 1,
    });
    assert_eq!(call.status(), Some(ConversationStatus::Connected));

    session.fail_next(
        MockOperation::LeaveCall,
        Error::Service {
            message: "not in call".into(),
            code: None,
            status: 409,
        },
    );
    let err = call.leave().await.unwrap_err();
    assert!(matches!(err, CoreError::Rejected { .. }));
    assert_eq!(call.status(), Some(ConversationStatus::Connected));
    assert_eq!(
        client.get_state().diagnostics.get(OperationCategory::Call).unwrap().kind,
        DiagnosticKind::Rejected
    );

    call.leave().await.unwrap();
    assert_eq!(call.status(), Some(ConversationStatus::Disconnecting));
    assert!(client.get_state().diagnostics.is_empty());
}

#[tokio::test]
async fn test_failed_join_leaves_call_disconnected() {
    let (session, client) = setup();
    let call = client.get_call_handle(&id("call-1")).unwrap();
    session.fail_next(MockOperation::JoinCall, Error::Timeout { timeout_secs: 30 });

    assert!(call.join().await.unwrap_err().is_transient());
    assert_eq!(call.status(), Some(ConversationStatus::Disconnected));
}

// ── Dispose ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_dispose_is_final() {
    let (session, client) = setup();
    session.emit(&thread_created("t1", 1));
    client.start_realtime_notifications().await.unwrap();
    let thread = client.get_thread_client(&id("t1")).unwrap();
    let (handler, handler_hits) = counting_handler();
    let (listener, listener_hits) = counting_listener();
    client.on_state_change(handler);
    client.on(EventKind::ThreadCreated, listener);
    assert!(session.total_listeners() > 0);

    client.dispose();
    client.dispose();

    assert!(client.is_disposed());
    assert!(thread.is_disposed());
    assert!(!client.is_realtime_active());
    assert_eq!(session.total_listeners(), 0);

    let before = client.get_state();
    session.emit(&thread_created("t2", 2));
    assert!(Arc::ptr_eq(&before, &client.get_state()));
    assert_eq!(hits(&handler_hits), 0);
    assert_eq!(hits(&listener_hits), 0);

    assert!(matches!(
        client.get_thread_client(&id("t1")),
        Err(CoreError::Disposed)
    ));
    assert!(matches!(
        thread.send_message("late", MessageKind::Text).await,
        Err(CoreError::Disposed)
    ));
    assert!(matches!(
        client.enumerate_devices().await,
        Err(CoreError::Disposed)
    ));
}

#[test]
fn test_dropping_every_clone_detaches_quietly() {
    let (session, client) = setup();
    let (handler, count) = counting_handler();
    client.on_state_change(handler);
    drop(client);

    // The SDK still holds the listener, but it only has a weak reference.
    session.emit(&thread_created("t1", 1));
    assert_eq!(hits(&count), 0);
    assert!(session.total_listeners() > 0);
}
