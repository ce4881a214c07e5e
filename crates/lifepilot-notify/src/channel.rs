// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification channel with automatic reconnection.
//!
//! A single supervisor task owns the connection. It cycles through
//! `Connecting -> Connected -> Disconnected`, then waits out the policy
//! delay before the next attempt. Inbound notifications are prepended to a
//! backlog published through a watch channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::{FutureExt, StreamExt};
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lifepilot_core::{ConnectionState, Connector, InboundStream, Notification};

use crate::event::{parse_event, InboundEvent};
use crate::reconnect::ReconnectPolicy;

struct Supervisor {
    device_id: String,
    token: CancellationToken,
    wake: Arc<Notify>,
    /// Set by `connect()` while disconnected; consumed by the supervisor.
    wake_requested: bool,
}

struct Shared {
    connector: Arc<dyn Connector>,
    policy: Arc<dyn ReconnectPolicy>,
    state: watch::Sender<ConnectionState>,
    backlog: watch::Sender<Vec<Notification>>,
    supervisor: Mutex<Option<Supervisor>>,
}

enum PumpExit {
    Closed,
    Cancelled,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Option<Supervisor>> {
        self.supervisor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes `next` unless the run identified by `token` was stopped.
    fn transition(&self, token: &CancellationToken, next: ConnectionState) -> bool {
        let mut slot = self.lock();
        if token.is_cancelled() {
            return false;
        }
        if next == ConnectionState::Connecting {
            // A new attempt satisfies any pending connect().
            if let Some(running) = slot.as_mut() {
                running.wake_requested = false;
            }
        }
        self.state.send_replace(next);
        true
    }

    fn ingest(&self, text: &str) {
        match parse_event(text) {
            InboundEvent::Notification(notification) => {
                let id = notification.id.clone();
                let added = self.backlog.send_if_modified(|backlog| {
                    if backlog.iter().any(|n| n.id == notification.id) {
                        return false;
                    }
                    backlog.insert(0, notification);
                    true
                });
                if added {
                    info!(id = %id, "notification received");
                } else {
                    debug!(id = %id, "duplicate notification dropped");
                }
            }
            InboundEvent::Other(kind) => debug!(kind = %kind, "ignoring inbound event"),
            InboundEvent::Malformed(reason) => debug!(reason = %reason, "dropping malformed frame"),
        }
    }

    async fn pump(&self, mut inbound: InboundStream, token: &CancellationToken) -> PumpExit {
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return PumpExit::Cancelled,
                next = inbound.next() => next,
            };
            match next {
                Some(Ok(text)) => self.ingest(&text),
                // The close that follows schedules the reconnect.
                Some(Err(e)) => warn!(error = %e, "notification connection error"),
                None => return PumpExit::Closed,
            }
        }
    }

    /// Marks the run finished unless something already stopped it.
    ///
    /// Returns false if a `connect()` arrived after the last attempt; the run
    /// then continues with a fresh budget.
    fn give_up(&self, token: &CancellationToken) -> bool {
        let mut slot = self.lock();
        if token.is_cancelled() {
            return true;
        }
        if let Some(running) = slot.as_mut() {
            if std::mem::take(&mut running.wake_requested) {
                return false;
            }
        }
        token.cancel();
        *slot = None;
        self.state.send_replace(ConnectionState::Disconnected);
        true
    }

    /// Clears a pending `connect()` request for the run identified by `token`.
    fn take_wake(&self, token: &CancellationToken) -> bool {
        let mut slot = self.lock();
        if token.is_cancelled() {
            return false;
        }
        slot.as_mut()
            .is_some_and(|running| std::mem::take(&mut running.wake_requested))
    }

    async fn supervise(
        self: Arc<Self>,
        device_id: String,
        token: CancellationToken,
        wake: Arc<Notify>,
    ) {
        let mut attempt: u32 = 0;
        loop {
            if !self.transition(&token, ConnectionState::Connecting) {
                return;
            }
            let _ = wake.notified().now_or_never();
            debug!(device_id = %device_id, "opening notification channel");

            let opened = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                opened = self.connector.open(&device_id) => opened,
            };
            match opened {
                Ok(inbound) => {
                    if !self.transition(&token, ConnectionState::Connected) {
                        return;
                    }
                    info!(device_id = %device_id, "notification channel connected");
                    attempt = 0;
                    if let PumpExit::Cancelled = self.pump(inbound, &token).await {
                        return;
                    }
                    info!("notification channel closed");
                }
                Err(e) => warn!(error = %e, "notification channel connect failed"),
            }

            if !self.transition(&token, ConnectionState::Disconnected) {
                return;
            }
            attempt = attempt.saturating_add(1);
            let Some(delay) = self.policy.next_delay(attempt) else {
                if self.give_up(&token) {
                    warn!(attempts = attempt, "giving up on notification channel");
                    return;
                }
                debug!("connect requested after the last attempt; starting over");
                attempt = 0;
                continue;
            };
            debug!(attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");

            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = wake.notified() => {
                    self.take_wake(&token);
                    debug!("reconnect requested early");
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

/// Owned handle to the notification channel.
///
/// Dropping the handle stops the connection.
pub struct NotificationChannel {
    shared: Arc<Shared>,
}

impl NotificationChannel {
    pub fn new(connector: Arc<dyn Connector>, policy: Arc<dyn ReconnectPolicy>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        let (backlog, _) = watch::channel(Vec::new());
        Self {
            shared: Arc::new(Shared {
                connector,
                policy,
                state,
                backlog,
                supervisor: Mutex::new(None),
            }),
        }
    }

    /// Opens the channel for `device_id`. Must be called within a tokio runtime.
    ///
    /// No-op while connecting or connected. While a reconnect delay is
    /// pending, triggers the attempt immediately.
    pub fn connect(&self, device_id: &str) {
        let mut slot = self.shared.lock();
        if let Some(running) = slot.as_mut() {
            if running.device_id != device_id {
                warn!(
                    running = %running.device_id,
                    requested = %device_id,
                    "channel already running for another device; ignoring"
                );
                return;
            }
            match *self.shared.state.borrow() {
                ConnectionState::Connecting | ConnectionState::Connected => {
                    debug!("connect ignored; channel already active");
                }
                ConnectionState::Disconnected => {
                    running.wake_requested = true;
                    running.wake.notify_one();
                }
            }
            return;
        }

        let token = CancellationToken::new();
        let wake = Arc::new(Notify::new());
        *slot = Some(Supervisor {
            device_id: device_id.to_string(),
            token: token.clone(),
            wake: Arc::clone(&wake),
            wake_requested: false,
        });
        // Published under the lock so a concurrent `connect()` sees it.
        self.shared.state.send_replace(ConnectionState::Connecting);
        drop(slot);

        tokio::spawn(Arc::clone(&self.shared).supervise(device_id.to_string(), token, wake));
    }

    /// Closes the connection and cancels any pending reconnect.
    pub fn disconnect(&self) {
        let mut slot = self.shared.lock();
        if let Some(running) = slot.take() {
            running.token.cancel();
            info!(device_id = %running.device_id, "notification channel disconnected");
        }
        self.shared.state.send_replace(ConnectionState::Disconnected);
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Snapshot of the backlog, newest first.
    pub fn backlog(&self) -> Vec<Notification> {
        self.shared.backlog.borrow().clone()
    }

    /// Receiver notified whenever the backlog changes.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Notification>> {
        self.shared.backlog.subscribe()
    }

    pub fn unread_count(&self) -> usize {
        self.shared.backlog.borrow().iter().filter(|n| !n.read).count()
    }

    /// Marks one notification read. Returns false for unknown or already-read ids.
    pub fn mark_read(&self, id: &str) -> bool {
        self.shared.backlog.send_if_modified(|backlog| {
            match backlog.iter_mut().find(|n| n.id == id && !n.read) {
                Some(n) => {
                    n.read = true;
                    true
                }
                None => false,
            }
        })
    }

    /// Marks every notification read; returns how many changed.
    pub fn mark_all_read(&self) -> usize {
        let mut changed = 0;
        self.shared.backlog.send_if_modified(|backlog| {
            for n in backlog.iter_mut().filter(|n| !n.read) {
                n.read = true;
                changed += 1;
            }
            changed > 0
        });
        changed
    }

    /// Empties the backlog. The connection is unaffected.
    pub fn clear(&self) {
        self.shared.backlog.send_if_modified(|backlog| {
            let had_any = !backlog.is_empty();
            backlog.clear();
            had_any
        });
    }
}

impl Drop for NotificationChannel {
    fn drop(&mut self) {
        if let Some(running) = self.shared.lock().take() {
            running.token.cancel();
        }
    }
}

impl std::fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("state", &self.state())
            .field("backlog", &self.shared.backlog.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconnect::FixedDelay;
    use lifepilot_core::Priority;
    use lifepilot_test_utils::MockConnector;
    use std::time::Duration;

    fn channel(connector: &Arc<MockConnector>) -> NotificationChannel {
        NotificationChannel::new(
            Arc::clone(connector) as Arc<dyn Connector>,
            Arc::new(FixedDelay::new(Duration::from_secs(3))),
        )
    }

    async fn wait_backlog(channel: &NotificationChannel, len: usize) {
        let mut rx = channel.subscribe();
        rx.wait_for(|b| b.len() >= len).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn backlog_is_newest_first_without_duplicates() {
        let connector = Arc::new(MockConnector::new());
        let server = connector.accept_next().await;
        let channel = channel(&connector);
        channel.connect("device-1");

        server.send_notification("n1", "first", "low");
        server.send_text(r#"{"type":"heartbeat"}"#);
        server.send_text("{broken");
        server.send_notification("n1", "first again", "low");
        server.send_notification("n2", "second", "high");
        wait_backlog(&channel, 2).await;

        let backlog = channel.backlog();
        let ids: Vec<_> = backlog.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["n2", "n1"]);
        assert_eq!(backlog[1].message, "first");
        assert_eq!(backlog[0].priority, Priority::High);
    }

    #[tokio::test(start_paused = true)]
    async fn mark_all_read_and_clear() {
        let connector = Arc::new(MockConnector::new());
        let server = connector.accept_next().await;
        let channel = channel(&connector);
        channel.connect("device-1");

        server.send_notification("a", "one", "low");
        server.send_notification("b", "two", "low");
        wait_backlog(&channel, 2).await;

        assert_eq!(channel.unread_count(), 2);
        assert_eq!(channel.mark_all_read(), 2);
        assert_eq!(channel.mark_all_read(), 0);
        assert_eq!(channel.unread_count(), 0);

        channel.clear();
        assert!(channel.backlog().is_empty());
        assert_eq!(channel.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn connect_between_last_failure_and_give_up_keeps_the_run() {
        let connector = Arc::new(MockConnector::new());
        let channel = channel(&connector);
        let token = CancellationToken::new();
        *channel.shared.lock() = Some(Supervisor {
            device_id: "device-1".into(),
            token: token.clone(),
            wake: Arc::new(Notify::new()),
            wake_requested: false,
        });
        channel.shared.state.send_replace(ConnectionState::Disconnected);

        // The supervisor has published Disconnected but not yet given up.
        channel.connect("device-1");
        assert!(!channel.shared.give_up(&token));
        assert!(!token.is_cancelled());
        assert!(channel.shared.lock().is_some());

        // Without a pending request the run ends.
        assert!(channel.shared.give_up(&token));
        assert!(token.is_cancelled());
        assert!(channel.shared.lock().is_none());
        assert_eq!(channel.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_closes_connection() {
        let connector = Arc::new(MockConnector::new());
        let server = connector.accept_next().await;
        let channel = channel(&connector);
        channel.connect("device-1");
        channel
            .watch_state()
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();

        drop(channel);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(server.is_closed());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.attempt_count().await, 1);
    }
}
