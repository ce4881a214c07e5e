// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection lifecycle tests for the notification channel, driven by a
//! scripted connector under paused time.

use std::sync::Arc;
use std::time::Duration;

use lifepilot_core::{ConnectionState, Connector};
use lifepilot_notify::{FixedDelay, NotificationChannel, ReconnectPolicy};
use lifepilot_test_utils::MockConnector;
use tokio::time::Instant;

const DELAY: Duration = Duration::from_secs(3);

fn channel_with(connector: &Arc<MockConnector>, policy: FixedDelay) -> NotificationChannel {
    NotificationChannel::new(
        Arc::clone(connector) as Arc<dyn Connector>,
        Arc::new(policy) as Arc<dyn ReconnectPolicy>,
    )
}

async fn wait_state(channel: &NotificationChannel, want: ConnectionState) {
    let mut rx = channel.watch_state();
    rx.wait_for(|s| *s == want).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn notification_arrives_unread_and_mark_read_is_idempotent() {
    let connector = Arc::new(MockConnector::new());
    let server = connector.accept_next().await;
    let channel = channel_with(&connector, FixedDelay::new(DELAY));

    channel.connect("device-1");
    wait_state(&channel, ConnectionState::Connected).await;
    assert_eq!(connector.attempts().await, vec!["device-1".to_string()]);

    server.send_notification("n1", "Time to stretch", "normal");
    let mut backlog = channel.subscribe();
    backlog.wait_for(|b| !b.is_empty()).await.unwrap();

    let first = &channel.backlog()[0];
    assert_eq!(first.id, "n1");
    assert!(!first.read);
    assert_eq!(channel.unread_count(), 1);

    assert!(channel.mark_read("n1"));
    assert_eq!(channel.unread_count(), 0);
    assert!(!channel.mark_read("n1"));
    assert!(!channel.mark_read("missing"));
    assert_eq!(channel.unread_count(), 0);
    assert!(channel.backlog()[0].read);
}

#[tokio::test(start_paused = true)]
async fn connect_is_noop_while_active() {
    let connector = Arc::new(MockConnector::new());
    let _server = connector.accept_next().await;
    let channel = channel_with(&connector, FixedDelay::new(DELAY));

    channel.connect("device-1");
    channel.connect("device-1");
    wait_state(&channel, ConnectionState::Connected).await;
    channel.connect("device-1");

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.attempt_count().await, 1);
    assert_eq!(channel.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn one_reconnect_per_close_after_delay() {
    let connector = Arc::new(MockConnector::new());
    let server = connector.accept_next().await;
    let _next = connector.accept_next().await;
    let channel = channel_with(&connector, FixedDelay::new(DELAY));

    channel.connect("device-1");
    wait_state(&channel, ConnectionState::Connected).await;

    let closed_at = Instant::now();
    server.close();
    wait_state(&channel, ConnectionState::Disconnected).await;

    connector.wait_for_attempts(2).await;
    assert!(closed_at.elapsed() >= DELAY);
    wait_state(&channel, ConnectionState::Connected).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempt_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn error_then_close_schedules_a_single_reconnect() {
    let connector = Arc::new(MockConnector::new());
    let server = connector.accept_next().await;
    let _next = connector.accept_next().await;
    let channel = channel_with(&connector, FixedDelay::new(DELAY));

    channel.connect("device-1");
    wait_state(&channel, ConnectionState::Connected).await;

    server.fail("connection reset");
    connector.wait_for_attempts(2).await;
    wait_state(&channel, ConnectionState::Connected).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempt_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn disconnect_suppresses_reconnect() {
    let connector = Arc::new(MockConnector::new());
    let server = connector.accept_next().await;
    let channel = channel_with(&connector, FixedDelay::new(DELAY));

    channel.connect("device-1");
    wait_state(&channel, ConnectionState::Connected).await;

    channel.disconnect();
    assert_eq!(channel.state(), ConnectionState::Disconnected);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert!(server.is_closed());
    assert_eq!(connector.attempt_count().await, 1);
    assert_eq!(channel.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn disconnect_during_delay_cancels_pending_attempt() {
    let connector = Arc::new(MockConnector::new());
    let channel = channel_with(&connector, FixedDelay::new(DELAY));

    // Nothing scripted: the first attempt is refused.
    channel.connect("device-1");
    connector.wait_for_attempts(1).await;
    wait_state(&channel, ConnectionState::Disconnected).await;

    channel.disconnect();
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.attempt_count().await, 1);
}

#[tokio::test(start_paused = true)]
async fn connect_during_delay_retries_immediately() {
    let connector = Arc::new(MockConnector::new());
    let channel = channel_with(&connector, FixedDelay::new(Duration::from_secs(60)));

    channel.connect("device-1");
    connector.wait_for_attempts(1).await;
    wait_state(&channel, ConnectionState::Disconnected).await;

    let _server = connector.accept_next().await;
    let started = Instant::now();
    channel.connect("device-1");
    wait_state(&channel, ConnectionState::Connected).await;

    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(connector.attempt_count().await, 2);
}

#[tokio::test(start_paused = true)]
async fn gives_up_after_max_attempts_and_can_restart() {
    let connector = Arc::new(MockConnector::new());
    let channel = channel_with(&connector, FixedDelay::new(DELAY).with_max_attempts(2));

    channel.connect("device-1");
    // Initial attempt plus two reconnects, all refused.
    connector.wait_for_attempts(3).await;
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.attempt_count().await, 3);
    assert_eq!(channel.state(), ConnectionState::Disconnected);

    let _server = connector.accept_next().await;
    channel.connect("device-1");
    wait_state(&channel, ConnectionState::Connected).await;
    assert_eq!(connector.attempt_count().await, 4);
}

#[tokio::test(start_paused = true)]
async fn successful_connect_resets_attempt_budget() {
    let connector = Arc::new(MockConnector::new());
    let first = connector.accept_next().await;
    let channel = channel_with(&connector, FixedDelay::new(DELAY).with_max_attempts(1));

    channel.connect("device-1");
    wait_state(&channel, ConnectionState::Connected).await;

    let second = connector.accept_next().await;
    first.close();
    connector.wait_for_attempts(2).await;
    wait_state(&channel, ConnectionState::Connected).await;

    // The budget of one applies again after the second connection closes.
    second.close();
    connector.wait_for_attempts(3).await;
    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.attempt_count().await, 3);
}
