// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted chat backend for deterministic testing.
//!
//! `MockChatBackend` implements `ChatBackend` with pre-configured replies,
//! enabling session tests without a running server.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream;
use tokio::sync::{mpsc, Mutex};

use lifepilot_core::{
    ChatBackend, ChatContext, ChatReply, MessageMetadata, PilotError, ReplyEvent, ReplyStream,
};

/// One scripted answer, consumed by the next request.
pub enum ScriptedReply {
    /// A finite stream; ends gracefully after the items unless one is an error.
    Events(Vec<Result<ReplyEvent, PilotError>>),
    /// A stream fed by the test through a [`LiveReply`].
    Live(mpsc::UnboundedReceiver<Result<ReplyEvent, PilotError>>),
    /// The request itself fails before any stream is returned.
    Refuse(PilotError),
    /// A single-shot reply.
    Complete(ChatReply),
    /// The request is accepted but the response never opens.
    Stall,
}

/// A request the backend received.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub message: String,
    pub system_prompt: Option<String>,
    pub streaming: bool,
}

/// Test-side handle feeding a [`ScriptedReply::Live`] stream.
///
/// Dropping the handle (or calling [`finish`](Self::finish)) ends the
/// stream gracefully.
pub struct LiveReply {
    tx: mpsc::UnboundedSender<Result<ReplyEvent, PilotError>>,
}

impl LiveReply {
    /// Delivers a text delta.
    pub fn delta(&self, text: &str) {
        let _ = self.tx.send(Ok(ReplyEvent::Delta(text.to_string())));
    }

    /// Delivers reply metadata.
    pub fn metadata(&self, metadata: MessageMetadata) {
        let _ = self.tx.send(Ok(ReplyEvent::Metadata(metadata)));
    }

    /// Ends the stream with an error.
    pub fn fail(self, error: PilotError) {
        let _ = self.tx.send(Err(error));
    }

    /// Ends the stream gracefully.
    pub fn finish(self) {}

    /// True once the consumer dropped the stream (e.g. after cancellation).
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A mock chat backend that replays scripted replies in FIFO order.
///
/// When the queue is empty, a single "mock response" delta is streamed.
pub struct MockChatBackend {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockChatBackend {
    /// Create a new backend with an empty script.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue an arbitrary scripted reply.
    pub async fn push(&self, reply: ScriptedReply) {
        self.replies.lock().await.push_back(reply);
    }

    /// Queue a stream of deltas that ends with the sentinel.
    pub async fn push_tokens(&self, tokens: &[&str]) {
        self.push(ScriptedReply::Events(deltas(tokens))).await;
    }

    /// Queue a stream of deltas whose transport closes before the sentinel.
    pub async fn push_truncated(&self, tokens: &[&str]) {
        let mut events = deltas(tokens);
        events.push(Err(PilotError::TruncatedStream));
        self.push(ScriptedReply::Events(events)).await;
    }

    /// Queue a request-level failure.
    pub async fn push_refusal(&self, error: PilotError) {
        self.push(ScriptedReply::Refuse(error)).await;
    }

    /// Queue a single-shot reply.
    pub async fn push_complete(&self, content: &str, metadata: MessageMetadata) {
        self.push(ScriptedReply::Complete(ChatReply {
            content: content.to_string(),
            metadata,
        }))
        .await;
    }

    /// Queue a request that hangs before the response opens.
    pub async fn push_stalled(&self) {
        self.push(ScriptedReply::Stall).await;
    }

    /// Queue a live stream and return the handle driving it.
    pub async fn push_live(&self) -> LiveReply {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(ScriptedReply::Live(rx)).await;
        LiveReply { tx }
    }

    /// Requests received so far.
    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    /// Number of requests received so far.
    pub async fn request_count(&self) -> usize {
        self.requests.lock().await.len()
    }

    async fn next_reply(
        &self,
        context: &ChatContext,
        message: &str,
        streaming: bool,
    ) -> Option<ScriptedReply> {
        self.requests.lock().await.push(RecordedRequest {
            message: message.to_string(),
            system_prompt: context.system_prompt.clone(),
            streaming,
        });
        self.replies.lock().await.pop_front()
    }
}

impl Default for MockChatBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn deltas(tokens: &[&str]) -> Vec<Result<ReplyEvent, PilotError>> {
    tokens
        .iter()
        .map(|t| Ok(ReplyEvent::Delta(t.to_string())))
        .collect()
}

#[async_trait]
impl ChatBackend for MockChatBackend {
    async fn stream_reply(
        &self,
        context: &ChatContext,
        message: &str,
    ) -> Result<ReplyStream, PilotError> {
        match self.next_reply(context, message, true).await {
            None => Ok(Box::pin(stream::iter(deltas(&["mock response"])))),
            Some(ScriptedReply::Events(events)) => Ok(Box::pin(stream::iter(events))),
            Some(ScriptedReply::Live(rx)) => Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            }))),
            Some(ScriptedReply::Refuse(error)) => Err(error),
            Some(ScriptedReply::Stall) => std::future::pending().await,
            Some(ScriptedReply::Complete(_)) => Err(PilotError::Internal(
                "scripted reply is single-shot, not a stream".into(),
            )),
        }
    }

    async fn complete_reply(
        &self,
        context: &ChatContext,
        message: &str,
    ) -> Result<ChatReply, PilotError> {
        match self.next_reply(context, message, false).await {
            None => Ok(ChatReply {
                content: "mock response".into(),
                metadata: MessageMetadata::default(),
            }),
            Some(ScriptedReply::Complete(reply)) => Ok(reply),
            Some(ScriptedReply::Refuse(error)) => Err(error),
            Some(ScriptedReply::Stall) => std::future::pending().await,
            Some(ScriptedReply::Events(events)) => {
                let mut reply = ChatReply::default();
                for event in events {
                    match event? {
                        ReplyEvent::Delta(text) => reply.content.push_str(&text),
                        ReplyEvent::Metadata(meta) => reply.metadata.merge(meta),
                    }
                }
                Ok(reply)
            }
            Some(ScriptedReply::Live(_)) => Err(PilotError::Internal(
                "live replies are only available on the streaming path".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    async fn collect_text(stream: ReplyStream) -> (String, Option<PilotError>) {
        let mut text = String::new();
        let mut error = None;
        let items: Vec<_> = stream.collect().await;
        for item in items {
            match item {
                Ok(ReplyEvent::Delta(d)) => text.push_str(&d),
                Ok(ReplyEvent::Metadata(_)) => {}
                Err(e) => error = Some(e),
            }
        }
        (text, error)
    }

    #[tokio::test]
    async fn default_reply_when_script_empty() {
        let backend = MockChatBackend::new();
        let stream = backend
            .stream_reply(&ChatContext::default(), "hi")
            .await
            .unwrap();
        assert_eq!(collect_text(stream).await.0, "mock response");
        assert_eq!(backend.request_count().await, 1);
    }

    #[tokio::test]
    async fn scripted_replies_in_order() {
        let backend = MockChatBackend::new();
        backend.push_tokens(&["first"]).await;
        backend.push_truncated(&["sec"]).await;

        let ctx = ChatContext::default();
        let (text, error) = collect_text(backend.stream_reply(&ctx, "a").await.unwrap()).await;
        assert_eq!(text, "first");
        assert!(error.is_none());

        let (text, error) = collect_text(backend.stream_reply(&ctx, "b").await.unwrap()).await;
        assert_eq!(text, "sec");
        assert!(matches!(error, Some(PilotError::TruncatedStream)));

        let messages: Vec<String> = backend
            .requests()
            .await
            .into_iter()
            .map(|r| r.message)
            .collect();
        assert_eq!(messages, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn live_reply_is_driven_by_the_test() {
        let backend = MockChatBackend::new();
        let live = backend.push_live().await;
        let mut stream = backend
            .stream_reply(&ChatContext::default(), "hi")
            .await
            .unwrap();

        live.delta("one");
        assert_eq!(
            stream.next().await.unwrap().unwrap(),
            ReplyEvent::Delta("one".into())
        );
        live.finish();
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn complete_reply_concatenates_scripted_events() {
        let backend = MockChatBackend::new();
        backend.push_tokens(&["Sure", ", ok"]).await;
        let reply = backend
            .complete_reply(&ChatContext::default(), "hi")
            .await
            .unwrap();
        assert_eq!(reply.content, "Sure, ok");
        assert!(!backend.requests().await[0].streaming);
    }
}
