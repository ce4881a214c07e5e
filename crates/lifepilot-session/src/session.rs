// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state machine.
//!
//! A session goes through states: Idle -> Sending -> Streaming -> Idle.
//! Failures land in Error, which accepts the next send like Idle does.
//! Cancellation returns a streaming session to Idle without recording an
//! error.
//!
//! The session is a cheap cloneable handle. All mutation happens under a
//! short synchronous lock that is never held across an await; every change
//! is published to subscribers as a [`SessionSnapshot`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use lifepilot_core::types::parse_timestamp;
use lifepilot_core::{
    ChatBackend, ChatContext, ErrorKind, HistoryEntry, HistoryStore, Message, MessageId,
    PilotError, ReplyEvent, Role,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// States in the session FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Ready for a new message.
    Idle,
    /// Request sent, waiting for the response to open.
    Sending,
    /// Deltas are being appended to the in-progress assistant message.
    Streaming,
    /// The last send failed. Accepts a new send.
    Error,
}

impl SessionState {
    /// Whether `send()` may start from this state.
    pub fn accepts_send(self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Error)
    }

    /// Whether a send is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, SessionState::Sending | SessionState::Streaming)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Sending => write!(f, "sending"),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Error => write!(f, "error"),
        }
    }
}

/// The dismissible error slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&PilotError> for SessionError {
    fn from(err: &PilotError) -> Self {
        Self {
            kind: err.kind(),
            message: err.user_message(),
        }
    }
}

/// Read-only view of the session published after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub messages: Vec<Message>,
    pub input: String,
    pub error: Option<SessionError>,
    pub system_prompt: Option<String>,
}

impl SessionSnapshot {
    /// The message currently receiving deltas, if any.
    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.streaming)
    }

    /// The most recent assistant message.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::Assistant)
    }
}

/// How a call to `send()` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// The reply arrived in full.
    Completed,
    /// The user cancelled; the partial reply was kept.
    Cancelled,
    /// The send failed; the error slot holds the reason.
    Failed(SessionError),
    /// Nothing was sent: the session was busy or the input was blank.
    Ignored,
}

/// Construction options, usually derived from `[chat]` configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Use the streaming path. When false, replies arrive in one piece.
    pub streaming: bool,
    /// Assistant text appended to the log when a send fails.
    pub apology_message: String,
    pub system_prompt: Option<String>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            streaming: true,
            apology_message: "Sorry, I couldn't complete that request. Please try again."
                .to_string(),
            system_prompt: None,
        }
    }
}

impl SessionOptions {
    /// Options from the `[chat]` section, resolving the system prompt file.
    pub fn from_config(chat: &lifepilot_config::model::ChatConfig) -> Self {
        Self {
            streaming: chat.streaming,
            apology_message: chat.apology_message.clone(),
            system_prompt: lifepilot_config::resolve_system_prompt(chat),
        }
    }
}

struct Inner {
    state: SessionState,
    messages: Vec<Message>,
    input: String,
    error: Option<SessionError>,
    system_prompt: Option<String>,
    /// Token of the send in flight. Cancelled tokens mark stale sends.
    in_flight: Option<CancellationToken>,
    history: Option<Arc<dyn HistoryStore>>,
}

impl Inner {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            messages: self.messages.clone(),
            input: self.input.clone(),
            error: self.error.clone(),
            system_prompt: self.system_prompt.clone(),
        }
    }

    fn message_mut(&mut self, id: &MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().rev().find(|m| &m.id == id)
    }

    /// Finalizes the reply being streamed, dropping it if nothing arrived.
    fn close_streaming_message(&mut self) {
        let Some(msg) = self.messages.iter_mut().rev().find(|m| m.streaming) else {
            return;
        };
        msg.finalize();
        if msg.content.is_empty() {
            let id = msg.id.clone();
            self.messages.retain(|m| m.id != id);
        }
    }

    /// Stops the send in flight and returns to Idle without an error.
    fn stop_in_flight(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        self.close_streaming_message();
        self.state = SessionState::Idle;
    }
}

struct Shared {
    backend: Arc<dyn ChatBackend>,
    streaming: bool,
    apology_message: String,
    inner: Mutex<Inner>,
    snapshots: watch::Sender<SessionSnapshot>,
}

/// Owns the conversation and orchestrates send, cancel, retry and history
/// load.
///
/// Clones share the same conversation.
#[derive(Clone)]
pub struct ChatSession {
    shared: Arc<Shared>,
}

impl ChatSession {
    /// Creates an idle session with an empty log.
    pub fn new(backend: Arc<dyn ChatBackend>, options: SessionOptions) -> Self {
        let inner = Inner {
            state: SessionState::Idle,
            messages: Vec::new(),
            input: String::new(),
            error: None,
            system_prompt: options.system_prompt,
            in_flight: None,
            history: None,
        };
        let (snapshots, _) = watch::channel(inner.snapshot());

        Self {
            shared: Arc::new(Shared {
                backend,
                streaming: options.streaming,
                apology_message: options.apology_message,
                inner: Mutex::new(inner),
                snapshots,
            }),
        }
    }

    /// Attaches the history collaborator used by [`load_history`](Self::load_history).
    pub fn with_history(self, history: Arc<dyn HistoryStore>) -> Self {
        self.set_history_store(Some(history));
        self
    }

    /// Replaces the history collaborator. Every clone of the handle sees it.
    pub fn set_history_store(&self, history: Option<Arc<dyn HistoryStore>>) {
        self.lock().history = history;
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.shared
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` under the lock and publishes the resulting snapshot.
    fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.lock();
        let result = f(&mut inner);
        self.shared.snapshots.send_replace(inner.snapshot());
        result
    }

    // --- Read access ---

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn input(&self) -> String {
        self.lock().input.clone()
    }

    pub fn error(&self) -> Option<SessionError> {
        self.lock().error.clone()
    }

    /// Receiver of snapshots; the latest value is always the current state.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.shared.snapshots.subscribe()
    }

    // --- Simple mutations ---

    pub fn set_input(&self, text: impl Into<String>) {
        let text = text.into();
        self.update(|inner| inner.input = text);
    }

    pub fn set_system_prompt(&self, prompt: Option<String>) {
        self.update(|inner| inner.system_prompt = prompt);
    }

    /// Clears the error slot. An errored session returns to Idle.
    pub fn dismiss_error(&self) {
        self.update(|inner| {
            inner.error = None;
            if inner.state == SessionState::Error {
                inner.state = SessionState::Idle;
            }
        });
    }

    /// Empties the log. Rejected while a send is in flight.
    pub fn clear(&self) -> Result<(), PilotError> {
        self.update(|inner| {
            if inner.state.is_busy() {
                return Err(PilotError::Busy(format!(
                    "cannot clear while {}",
                    inner.state
                )));
            }
            inner.messages.clear();
            inner.error = None;
            inner.state = SessionState::Idle;
            Ok(())
        })
    }

    // --- Send path ---

    /// Sends the current input buffer.
    pub async fn send(&self) -> SendOutcome {
        let text = self.input();
        self.submit(text, true).await
    }

    /// Replaces the input buffer with `text` and sends it.
    pub async fn send_text(&self, text: &str) -> SendOutcome {
        self.set_input(text);
        self.send().await
    }

    /// Resubmits the most recent user message as a fresh, independent send.
    ///
    /// Uses the session's configured path. The input buffer is left alone.
    pub async fn retry_last_message(&self) -> SendOutcome {
        let last = self
            .lock()
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone());

        match last {
            Some(text) => {
                info!("retrying last user message");
                self.submit(text, false).await
            }
            None => {
                debug!("retry requested with no user message in the log");
                SendOutcome::Ignored
            }
        }
    }

    async fn submit(&self, text: String, clear_input: bool) -> SendOutcome {
        // Gate check and transition to Sending happen under one lock.
        let started = self.update(|inner| {
            if !inner.state.accepts_send() {
                debug!(state = %inner.state, "send ignored: session busy");
                return None;
            }
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            inner.messages.push(Message::new(Role::User, text));
            if clear_input {
                inner.input.clear();
            }
            inner.state = SessionState::Sending;
            let token = CancellationToken::new();
            inner.in_flight = Some(token.clone());
            let context = ChatContext {
                system_prompt: inner.system_prompt.clone(),
            };
            Some((text.to_string(), context, token))
        });

        let Some((text, context, token)) = started else {
            return SendOutcome::Ignored;
        };
        let mut guard = InFlight {
            session: self,
            token: &token,
            settled: false,
        };

        debug!(len = text.len(), streaming = self.shared.streaming, "send started");
        let result = if self.shared.streaming {
            self.run_streaming(&context, &text, &token).await
        } else {
            self.run_complete(&context, &text, &token).await
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err((error, target)) => self.fail(error, target, &token),
        };
        guard.settled = true;
        outcome
    }

    /// Resets a send whose future was dropped before it settled.
    fn abandon(&self, token: &CancellationToken) {
        self.update(|inner| {
            // A cancelled token means cancel() or a later send already owns the state.
            if token.is_cancelled() {
                return;
            }
            inner.stop_in_flight();
            info!("send abandoned");
        });
    }

    async fn run_streaming(
        &self,
        context: &ChatContext,
        text: &str,
        token: &CancellationToken,
    ) -> Result<SendOutcome, (PilotError, Option<MessageId>)> {
        let mut stream = self
            .shared
            .backend
            .stream_reply(context, text)
            .await
            .map_err(|e| (e, None))?;

        let target = self.update(|inner| {
            if token.is_cancelled() {
                return None;
            }
            let placeholder = Message::streaming_placeholder();
            let id = placeholder.id.clone();
            inner.messages.push(placeholder);
            inner.state = SessionState::Streaming;
            Some(id)
        });
        let Some(target) = target else {
            return Ok(SendOutcome::Cancelled);
        };

        loop {
            let item = tokio::select! {
                biased;
                _ = token.cancelled() => return Ok(SendOutcome::Cancelled),
                item = stream.next() => item,
            };

            match item {
                Some(Ok(event)) => {
                    let applied = self.update(|inner| {
                        if token.is_cancelled() {
                            return false;
                        }
                        if let Some(msg) = inner.message_mut(&target) {
                            match event {
                                ReplyEvent::Delta(ref delta) => msg.append(delta),
                                ReplyEvent::Metadata(meta) => {
                                    msg.metadata.get_or_insert_with(Default::default).merge(meta)
                                }
                            }
                        }
                        true
                    });
                    if !applied {
                        return Ok(SendOutcome::Cancelled);
                    }
                }
                Some(Err(e)) => return Err((e, Some(target))),
                None => break,
            }
        }

        // Dropping the stream here closes the transport.
        drop(stream);

        let completed = self.update(|inner| {
            if token.is_cancelled() {
                return false;
            }
            if let Some(msg) = inner.message_mut(&target) {
                msg.finalize();
            }
            inner.state = SessionState::Idle;
            inner.error = None;
            inner.in_flight = None;
            true
        });

        if completed {
            info!(message_id = %target, "stream completed");
            Ok(SendOutcome::Completed)
        } else {
            Ok(SendOutcome::Cancelled)
        }
    }

    async fn run_complete(
        &self,
        context: &ChatContext,
        text: &str,
        token: &CancellationToken,
    ) -> Result<SendOutcome, (PilotError, Option<MessageId>)> {
        let reply = self
            .shared
            .backend
            .complete_reply(context, text)
            .await
            .map_err(|e| (e, None))?;

        let completed = self.update(|inner| {
            if token.is_cancelled() {
                return false;
            }
            let mut message = Message::new(Role::Assistant, reply.content);
            if !reply.metadata.is_empty() {
                message.metadata = Some(reply.metadata);
            }
            inner.messages.push(message);
            inner.state = SessionState::Idle;
            inner.error = None;
            inner.in_flight = None;
            true
        });

        if completed {
            info!("reply received");
            Ok(SendOutcome::Completed)
        } else {
            Ok(SendOutcome::Cancelled)
        }
    }

    /// Records a failed send: keeps any partial reply, appends the apology,
    /// fills the error slot.
    fn fail(
        &self,
        error: PilotError,
        target: Option<MessageId>,
        token: &CancellationToken,
    ) -> SendOutcome {
        let session_error = SessionError::from(&error);
        let apology = self.shared.apology_message.clone();

        let recorded = self.update(|inner| {
            if token.is_cancelled() {
                return false;
            }
            if let Some(ref id) = target {
                let empty = match inner.message_mut(id) {
                    Some(msg) => {
                        msg.finalize();
                        msg.content.is_empty()
                    }
                    None => false,
                };
                if empty {
                    inner.messages.retain(|m| &m.id != id);
                }
            }
            inner.messages.push(Message::new(Role::Assistant, apology));
            inner.error = Some(session_error.clone());
            inner.state = SessionState::Error;
            inner.in_flight = None;
            true
        });

        if recorded {
            warn!(kind = %error.kind(), error = %error, "send failed");
            SendOutcome::Failed(session_error)
        } else {
            SendOutcome::Cancelled
        }
    }

    /// Stops the in-progress stream, keeping the text received so far.
    ///
    /// Only valid while Streaming; returns whether anything was cancelled.
    /// A reply that received no text yet is removed. No error is recorded.
    pub fn cancel(&self) -> bool {
        self.update(|inner| {
            if inner.state != SessionState::Streaming {
                return false;
            }
            inner.stop_in_flight();
            info!("stream cancelled");
            true
        })
    }

    // --- History ---

    /// Replaces the log with persisted history.
    ///
    /// Fresh local ids are assigned and timestamps parsed; entries with an
    /// unknown role are skipped. Rejected while a send is in flight. Returns
    /// the number of messages loaded.
    pub async fn load_history(&self) -> Result<usize, PilotError> {
        let Some(history) = self.lock().history.clone() else {
            return Err(PilotError::Config("no history store configured".into()));
        };

        let state = self.state();
        if state.is_busy() {
            return Err(PilotError::Busy(format!("cannot load history while {state}")));
        }

        let entries = history.fetch_history().await?;
        let messages: Vec<Message> = entries.into_iter().filter_map(history_message).collect();
        let count = messages.len();

        self.update(|inner| {
            if inner.state.is_busy() {
                return Err(PilotError::Busy(format!(
                    "cannot load history while {}",
                    inner.state
                )));
            }
            inner.messages = messages;
            Ok(())
        })?;

        info!(count, "history loaded");
        Ok(count)
    }
}

/// Lives for one `submit`; resets the session if the send future is dropped
/// before the outcome is recorded.
struct InFlight<'a> {
    session: &'a ChatSession,
    token: &'a CancellationToken,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.session.abandon(self.token);
        }
    }
}

/// Converts a history entry into a finalized message with a fresh id.
fn history_message(entry: HistoryEntry) -> Option<Message> {
    let role = match entry.role.parse::<Role>() {
        Ok(role) => role,
        Err(_) => {
            warn!(role = %entry.role, "skipping history entry with unknown role");
            return None;
        }
    };
    let mut message = Message::new(role, entry.content);
    if let Some(created_at) = entry.timestamp.as_deref().and_then(parse_timestamp) {
        message.created_at = created_at;
    }
    Some(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_display_and_gates() {
        assert_eq!(SessionState::Streaming.to_string(), "streaming");
        assert!(SessionState::Idle.accepts_send());
        assert!(SessionState::Error.accepts_send());
        assert!(!SessionState::Sending.accepts_send());
        assert!(SessionState::Streaming.is_busy());
        assert!(!SessionState::Error.is_busy());
    }

    #[test]
    fn history_entries_get_fresh_ids_and_parsed_times() {
        let entry = HistoryEntry {
            role: "Assistant".into(),
            content: "Sure.".into(),
            timestamp: Some("2026-01-05T09:30:00".into()),
        };
        let a = history_message(entry.clone()).unwrap();
        let b = history_message(entry).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.role, Role::Assistant);
        assert_eq!(a.created_at.to_rfc3339(), "2026-01-05T09:30:00+00:00");
        assert!(!a.streaming);
    }

    #[test]
    fn history_entries_with_unknown_role_are_skipped() {
        let entry = HistoryEntry {
            role: "tool".into(),
            content: "{}".into(),
            timestamp: None,
        };
        assert!(history_message(entry).is_none());
    }

    #[test]
    fn session_error_uses_user_message() {
        let err = SessionError::from(&PilotError::TruncatedStream);
        assert_eq!(err.kind, ErrorKind::TruncatedStream);
        assert!(err.message.contains("interrupted"));
    }
}
