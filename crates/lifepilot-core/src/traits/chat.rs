// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat backend trait for the assistant endpoints (streaming and single-shot).

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::PilotError;
use crate::types::MessageMetadata;

/// Per-request context the session passes alongside the user's message.
#[derive(Debug, Clone, Default)]
pub struct ChatContext {
    /// System prompt forwarded with the request, if any.
    pub system_prompt: Option<String>,
}

/// One incremental event of a streamed reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyEvent {
    /// Text to append to the in-progress assistant message.
    Delta(String),
    /// Reply metadata (agent, tools, timing, payload).
    Metadata(MessageMetadata),
}

/// A streamed reply.
///
/// The stream ending without an error item is graceful completion. A
/// transport that closes early yields [`PilotError::TruncatedStream`] as the
/// final item. Dropping the stream cancels the request.
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<ReplyEvent, PilotError>> + Send>>;

/// A complete, non-streamed reply.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChatReply {
    pub content: String,
    pub metadata: MessageMetadata,
}

/// Backend that turns a user message into an assistant reply.
///
/// Implementations perform exactly one outbound request per call and never
/// retry on their own; retry is a session-level decision.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Opens a streaming request and returns the delta stream.
    async fn stream_reply(
        &self,
        context: &ChatContext,
        message: &str,
    ) -> Result<ReplyStream, PilotError>;

    /// Sends a request and waits for the full reply.
    async fn complete_reply(
        &self,
        context: &ChatContext,
        message: &str,
    ) -> Result<ChatReply, PilotError>;
}
