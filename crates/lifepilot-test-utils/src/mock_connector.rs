// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted duplex connector for notification channel tests.
//!
//! Each call to `open()` consumes the next scripted outcome: either a
//! refusal or a live connection driven by a [`ServerHandle`]. With nothing
//! scripted, `open()` fails as if the server were down.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::{mpsc, Mutex, Notify};

use lifepilot_core::{Connector, InboundStream, PilotError};

enum Outcome {
    Refuse(String),
    Accept(mpsc::UnboundedReceiver<Result<String, PilotError>>),
}

/// Server side of one accepted mock connection.
///
/// Dropping the handle closes the connection.
pub struct ServerHandle {
    tx: mpsc::UnboundedSender<Result<String, PilotError>>,
}

impl ServerHandle {
    /// Pushes a raw text frame.
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.tx.send(Ok(text.into()));
    }

    /// Pushes a well-formed notification event.
    pub fn send_notification(&self, id: &str, message: &str, priority: &str) {
        let event = serde_json::json!({
            "type": "notification",
            "data": {
                "id": id,
                "message": message,
                "priority": priority,
                "created_at": "2026-01-05T09:30:00Z",
            }
        });
        self.send_text(event.to_string());
    }

    /// Reports a connection error, then closes.
    pub fn fail(self, reason: &str) {
        let _ = self.tx.send(Err(PilotError::Transport {
            message: reason.to_string(),
            source: None,
        }));
    }

    /// Closes the connection.
    pub fn close(self) {}

    /// True once the client dropped its end.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A mock connector with a FIFO script of connection outcomes.
pub struct MockConnector {
    script: Arc<Mutex<VecDeque<Outcome>>>,
    opened: Arc<Mutex<Vec<String>>>,
    attempted: Arc<Notify>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            opened: Arc::new(Mutex::new(Vec::new())),
            attempted: Arc::new(Notify::new()),
        }
    }

    /// Script the next attempt to fail.
    pub async fn refuse_next(&self, reason: &str) {
        self.script
            .lock()
            .await
            .push_back(Outcome::Refuse(reason.to_string()));
    }

    /// Script the next attempt to succeed; returns the server side.
    pub async fn accept_next(&self) -> ServerHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        self.script.lock().await.push_back(Outcome::Accept(rx));
        ServerHandle { tx }
    }

    /// Device ids of every attempt so far, successful or not.
    pub async fn attempts(&self) -> Vec<String> {
        self.opened.lock().await.clone()
    }

    /// Number of attempts so far.
    pub async fn attempt_count(&self) -> usize {
        self.opened.lock().await.len()
    }

    /// Waits until the attempt count reaches `n`.
    pub async fn wait_for_attempts(&self, n: usize) {
        loop {
            let notified = self.attempted.notified();
            if self.attempt_count().await >= n {
                return;
            }
            notified.await;
        }
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, device_id: &str) -> Result<InboundStream, PilotError> {
        self.opened.lock().await.push(device_id.to_string());
        self.attempted.notify_waiters();

        match self.script.lock().await.pop_front() {
            Some(Outcome::Accept(rx)) => Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            }))),
            Some(Outcome::Refuse(reason)) => Err(PilotError::Transport {
                message: reason,
                source: None,
            }),
            None => Err(PilotError::Transport {
                message: "connection refused".into(),
                source: None,
            }),
        }
    }
}
