#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
//! Integration tests for the live state subscriber.
//!
//! Uses the shared `MockTransport` from `tests/common` to script feed frames
//! and checks what the public handle exposes: events, the latest snapshot,
//! the watch channel and the projected views downstream.

mod common;

use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use werewolf_client::protocol::Phase;
use werewolf_client::{
    project, Connector, LiveStateSubscriber, PanelHost, PanelState, ReconnectPolicy,
    SubscriberConfig, SubscriberEvent, ViewKind, WerewolfError,
};

use common::{game_state, kill, pong_json, snapshot_json, MockTransport};

/// Wait for the next event, failing the test after a second.
async fn next_event(rx: &mut mpsc::Receiver<SubscriberEvent>) -> SubscriberEvent {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn next_snapshot(
    rx: &mut mpsc::Receiver<SubscriberEvent>,
) -> std::sync::Arc<werewolf_client::GameState> {
    loop {
        if let SubscriberEvent::Snapshot(state) = next_event(rx).await {
            return state;
        }
    }
}

// ════════════════════════════════════════════════════════════════════
// Snapshot replacement
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn each_frame_replaces_the_snapshot() {
    let lobby = game_state(Phase::Lobby, 0);
    let night = game_state(Phase::Night, 1);
    let (transport, _sent, _closed) = MockTransport::new(vec![
        Some(Ok(snapshot_json(&lobby))),
        Some(Ok(snapshot_json(&night))),
    ]);

    let (mut subscriber, mut events) =
        LiveStateSubscriber::start(transport, SubscriberConfig::default());
    assert!(matches!(next_event(&mut events).await, SubscriberEvent::Connected));

    assert_eq!(next_snapshot(&mut events).await.phase, Phase::Lobby);
    let latest = next_snapshot(&mut events).await;
    assert_eq!(latest.phase, Phase::Night);
    assert_eq!(latest.day_number, 1);
    assert_eq!(subscriber.latest_snapshot().as_deref(), Some(&night));

    subscriber.shutdown().await;
}

#[tokio::test]
async fn pong_and_garbage_do_not_replace_the_snapshot() {
    let day = game_state(Phase::Day, 2);
    let (transport, _sent, _closed) = MockTransport::new(vec![
        Some(Ok(snapshot_json(&day))),
        Some(Ok(pong_json())),
        Some(Ok("{not json".to_string())),
        Some(Ok(r#"{"phase":"dusk"}"#.to_string())),
    ]);

    let (mut subscriber, mut events) =
        LiveStateSubscriber::start(transport, SubscriberConfig::default());
    let _ = next_snapshot(&mut events).await;

    // Nothing else arrives as a snapshot.
    let extra = tokio::time::timeout(Duration::from_millis(100), events.recv()).await;
    assert!(
        !matches!(extra, Ok(Some(SubscriberEvent::Snapshot(_)))),
        "unexpected snapshot: {extra:?}"
    );
    assert_eq!(subscriber.latest_snapshot().as_deref(), Some(&day));

    subscriber.shutdown().await;
}

#[tokio::test]
async fn watch_receiver_sees_latest_snapshot() {
    let voting = game_state(Phase::Voting, 1);
    let (transport, _sent, _closed) = MockTransport::new(vec![Some(Ok(snapshot_json(&voting)))]);

    let (mut subscriber, _events) =
        LiveStateSubscriber::start(transport, SubscriberConfig::default());
    let mut watch = subscriber.watch_snapshots();

    tokio::time::timeout(Duration::from_secs(1), watch.wait_for(Option::is_some))
        .await
        .expect("timed out waiting for snapshot")
        .expect("watch sender dropped");
    assert_eq!(
        watch.borrow().as_ref().map(|s| s.phase),
        Some(Phase::Voting)
    );

    subscriber.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Outgoing frames and lifecycle
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn ping_goes_out_as_action_frame() {
    let (transport, sent, _closed) = MockTransport::new(vec![]);
    let (mut subscriber, mut events) =
        LiveStateSubscriber::start(transport, SubscriberConfig::default());
    assert!(matches!(next_event(&mut events).await, SubscriberEvent::Connected));

    subscriber.ping().unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let frames = sent.lock().unwrap().clone();
    assert_eq!(frames.len(), 1);
    let frame: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
    assert_eq!(frame, serde_json::json!({ "action": "ping" }));

    subscriber.shutdown().await;
}

#[tokio::test]
async fn closed_feed_rejects_sends() {
    let transport = MockTransport::closing(vec![snapshot_json(&game_state(Phase::Lobby, 0))]);
    let (subscriber, mut events) =
        LiveStateSubscriber::start(transport, SubscriberConfig::default());

    loop {
        if let SubscriberEvent::Disconnected { reason } = next_event(&mut events).await {
            assert_eq!(reason, None);
            break;
        }
    }
    assert!(!subscriber.is_connected());
    assert!(matches!(subscriber.ping(), Err(WerewolfError::NotConnected)));
    // The last snapshot outlives the connection.
    assert!(subscriber.latest_snapshot().is_some());
}

#[tokio::test]
async fn shutdown_closes_transport() {
    let (transport, _sent, closed) = MockTransport::new(vec![]);
    let (mut subscriber, mut events) =
        LiveStateSubscriber::start(transport, SubscriberConfig::default());
    let _ = next_event(&mut events).await;

    subscriber.shutdown().await;
    assert!(closed.load(std::sync::atomic::Ordering::Relaxed));
    match next_event(&mut events).await {
        SubscriberEvent::Disconnected { reason } => {
            assert_eq!(reason.as_deref(), Some("client shut down"));
        }
        other => panic!("expected Disconnected, got {other:?}"),
    }
}

// ════════════════════════════════════════════════════════════════════
// Reconnection
// ════════════════════════════════════════════════════════════════════

struct QueueConnector {
    transports: StdMutex<VecDeque<MockTransport>>,
}

#[async_trait]
impl Connector for QueueConnector {
    type Transport = MockTransport;

    async fn connect(&self) -> Result<MockTransport, WerewolfError> {
        self.transports
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(WerewolfError::TransportClosed)
    }
}

#[tokio::test]
async fn feed_resumes_after_reconnect() {
    let first = MockTransport::closing(vec![snapshot_json(&game_state(Phase::Day, 1))]);
    let (second, _sent, _closed) =
        MockTransport::new(vec![Some(Ok(snapshot_json(&game_state(Phase::Voting, 1))))]);
    let connector = QueueConnector {
        transports: StdMutex::new(VecDeque::from([second])),
    };
    let config = SubscriberConfig::default().with_reconnect_policy(ReconnectPolicy {
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        multiplier: 2,
        max_attempts: 3,
    });

    let (mut subscriber, mut events) =
        LiveStateSubscriber::start_with_reconnect(first, connector, config);

    assert_eq!(next_snapshot(&mut events).await.phase, Phase::Day);
    let mut saw_reconnecting = false;
    loop {
        match next_event(&mut events).await {
            SubscriberEvent::Reconnecting { attempt, .. } => {
                assert_eq!(attempt, 1);
                saw_reconnecting = true;
            }
            SubscriberEvent::Snapshot(state) => {
                assert_eq!(state.phase, Phase::Voting);
                break;
            }
            SubscriberEvent::Connected => {}
            other => panic!("unexpected event {other:?}"),
        }
    }
    assert!(saw_reconnecting);
    assert!(subscriber.is_connected());

    subscriber.shutdown().await;
}

// ════════════════════════════════════════════════════════════════════
// Feed → projection → panel
// ════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn snapshots_drive_views_and_reset_panels() {
    let day = game_state(Phase::Day, 1);
    let mut next_day = game_state(Phase::Day, 2);
    kill(&mut next_day, "p4");
    let (transport, _sent, _closed) = MockTransport::new(vec![
        Some(Ok(snapshot_json(&day))),
        Some(Ok(snapshot_json(&next_day))),
    ]);
    let (mut subscriber, mut events) =
        LiveStateSubscriber::start(transport, SubscriberConfig::default());
    let mut panels = PanelHost::new();

    let state = next_snapshot(&mut events).await;
    let view = project(Some(&*state), "p2");
    assert_eq!(view.kind(), ViewKind::DayVote);
    panels.sync(&view);
    assert!(panels.panel_mut().unwrap().select("p4"));

    let state = next_snapshot(&mut events).await;
    let view = project(Some(&*state), "p2");
    panels.sync(&view);
    let panel = panels.panel().unwrap();
    assert_eq!(panel.state(), &PanelState::Idle);
    assert_eq!(panel.round().day_number, 2);

    // Dead viewers only watch.
    let view = project(subscriber.latest_snapshot().as_deref(), "p4");
    assert_eq!(view.kind(), ViewKind::Spectating);

    subscriber.shutdown().await;
}
