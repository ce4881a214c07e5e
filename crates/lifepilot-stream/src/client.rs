// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the LifePilot chat API.
//!
//! Provides [`ChatClient`] which handles request construction, identity
//! headers, status handling, and streaming frame decoding.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use lifepilot_config::model::ServerConfig;
use lifepilot_core::{
    ChatBackend, ChatContext, ChatReply, CredentialProvider, PilotError, ReplyEvent, ReplyStream,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use crate::frame::decode_frames;
use crate::types::{ApiErrorResponse, ChatRequest, ChatResponse, StreamFrame};

/// Header carrying the per-device identity on every request.
pub const DEVICE_ID_HEADER: &str = "x-device-id";

/// Builds the shared reqwest client with identity headers installed.
///
/// The bearer token is marked sensitive so it never shows up in debug output.
pub(crate) fn build_http_client(
    server: &ServerConfig,
    credentials: &dyn CredentialProvider,
) -> Result<reqwest::Client, PilotError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        DEVICE_ID_HEADER,
        HeaderValue::from_str(credentials.device_id())
            .map_err(|e| PilotError::Config(format!("invalid device id header value: {e}")))?,
    );
    if let Some(token) = credentials.token() {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| PilotError::Config(format!("invalid token header value: {e}")))?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }

    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(server.connect_timeout_secs))
        .build()
        .map_err(|e| PilotError::Internal(format!("failed to build HTTP client: {e}")))
}

/// Joins the configured base URL and an endpoint path.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

/// Maps a non-success response to [`PilotError::Status`], reading the body.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, PilotError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let body = match serde_json::from_str::<ApiErrorResponse>(&body) {
        Ok(api_err) => api_err.detail_text(),
        Err(_) => body,
    };
    warn!(status = %status, body = %body, "request failed");
    Err(PilotError::Status {
        status: status.as_u16(),
        body,
    })
}

/// HTTP chat backend.
///
/// Performs exactly one request per call; retry is left to the session.
#[derive(Debug, Clone)]
pub struct ChatClient {
    client: reqwest::Client,
    chat_url: String,
    stream_url: String,
    correlation_id: String,
}

impl ChatClient {
    /// Creates a client for the configured server, sending `credentials`
    /// with every request.
    pub fn new(
        server: &ServerConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, PilotError> {
        let client = build_http_client(server, credentials.as_ref())?;
        let chat_url = endpoint(&server.base_url, &server.chat_path);
        let stream_url = endpoint(&server.base_url, &server.stream_path);

        info!(stream_url = %stream_url, "chat client initialized");

        Ok(Self {
            client,
            chat_url,
            stream_url,
            correlation_id: credentials.device_id().to_string(),
        })
    }

    fn request_body(&self, context: &ChatContext, message: &str) -> ChatRequest {
        ChatRequest {
            correlation_id: self.correlation_id.clone(),
            message: message.to_string(),
            system_prompt: context.system_prompt.clone(),
        }
    }

    async fn post(&self, url: &str, body: &ChatRequest) -> Result<reqwest::Response, PilotError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| PilotError::transport(format!("HTTP request failed: {e}"), e))?;
        debug!(status = %response.status(), url, "response received");
        check_status(response).await
    }
}

/// Rejects messages that are empty after trimming.
fn validate_message(message: &str) -> Result<&str, PilotError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(PilotError::InvalidInput("message is empty".into()));
    }
    Ok(trimmed)
}

/// Expands one decoded frame into reply events.
fn frame_events(item: Result<StreamFrame, PilotError>) -> Vec<Result<ReplyEvent, PilotError>> {
    let frame = match item {
        Ok(frame) => frame,
        Err(e) => return vec![Err(e)],
    };
    if let Some(message) = frame.error {
        warn!(error = %message, "server reported an error mid-stream");
        return vec![Err(PilotError::Server(message))];
    }

    let mut events = Vec::with_capacity(2);
    if let Some(meta) = frame.metadata() {
        events.push(Ok(ReplyEvent::Metadata(meta)));
    }
    if let Some(token) = frame.token.filter(|t| !t.is_empty()) {
        events.push(Ok(ReplyEvent::Delta(token)));
    }
    events
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn stream_reply(
        &self,
        context: &ChatContext,
        message: &str,
    ) -> Result<ReplyStream, PilotError> {
        let message = validate_message(message)?;
        let body = self.request_body(context, message);
        let response = self.post(&self.stream_url, &body).await?;

        let frames = decode_frames::<_, _, _, StreamFrame>(response.bytes_stream());
        let events = frames
            .scan(false, |failed, item| {
                let next = if *failed {
                    None
                } else {
                    let events = frame_events(item);
                    *failed = events.iter().any(|e| e.is_err());
                    Some(stream::iter(events))
                };
                futures::future::ready(next)
            })
            .flatten();

        Ok(Box::pin(events))
    }

    async fn complete_reply(
        &self,
        context: &ChatContext,
        message: &str,
    ) -> Result<ChatReply, PilotError> {
        let message = validate_message(message)?;
        let body = self.request_body(context, message);
        let response = self.post(&self.chat_url, &body).await?;

        let text = response
            .text()
            .await
            .map_err(|e| PilotError::transport(format!("failed to read response body: {e}"), e))?;
        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| PilotError::Decode {
            message: format!("failed to parse chat response: {e}"),
            source: Some(Box::new(e)),
        })?;
        Ok(parsed.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifepilot_core::StaticCredentials;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PLAN_MY_WEEK: &str = "data: {\"token\":\"Sure\"}\n\n\
                                data: {\"token\":\", let's\"}\n\n\
                                data: {\"token\":\" start.\"}\n\n\
                                data: [DONE]\n\n";

    fn test_client(base_url: &str) -> ChatClient {
        let server = ServerConfig {
            base_url: base_url.to_string(),
            ..Default::default()
        };
        let credentials = Arc::new(StaticCredentials::new("device-1", Some("tok".into())));
        ChatClient::new(&server, credentials).unwrap()
    }

    fn sse(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/event-stream")
    }

    async fn drain(stream: ReplyStream) -> (String, Vec<ReplyEvent>, Option<PilotError>) {
        let items: Vec<_> = stream.collect().await;
        let mut text = String::new();
        let mut events = Vec::new();
        let mut error = None;
        for item in items {
            match item {
                Ok(ReplyEvent::Delta(ref d)) => {
                    text.push_str(d);
                    events.push(ReplyEvent::Delta(d.clone()));
                }
                Ok(event) => events.push(event),
                Err(e) => error = Some(e),
            }
        }
        (text, events, error)
    }

    #[tokio::test]
    async fn stream_reply_concatenates_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat/stream"))
            .and(header("authorization", "Bearer tok"))
            .and(header("x-device-id", "device-1"))
            .and(body_json(serde_json::json!({
                "correlation_id": "device-1",
                "message": "Plan my week"
            })))
            .respond_with(sse(PLAN_MY_WEEK))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let stream = client
            .stream_reply(&ChatContext::default(), "  Plan my week ")
            .await
            .unwrap();
        let (text, _, error) = drain(stream).await;
        assert_eq!(text, "Sure, let's start.");
        assert!(error.is_none());
    }

    #[tokio::test]
    async fn stream_reply_sends_system_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat/stream"))
            .and(body_json(serde_json::json!({
                "correlation_id": "device-1",
                "message": "hi",
                "system_prompt": "Be brief."
            })))
            .respond_with(sse("data: [DONE]\n"))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let context = ChatContext {
            system_prompt: Some("Be brief.".into()),
        };
        let stream = client.stream_reply(&context, "hi").await.unwrap();
        let (text, events, error) = drain(stream).await;
        assert!(text.is_empty() && events.is_empty() && error.is_none());
    }

    #[tokio::test]
    async fn stream_without_sentinel_is_truncated() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse("data: {\"token\":\"Sure\"}\n"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let stream = client
            .stream_reply(&ChatContext::default(), "Plan my week")
            .await
            .unwrap();
        let (text, _, error) = drain(stream).await;
        assert_eq!(text, "Sure");
        assert!(matches!(error, Some(PilotError::TruncatedStream)));
    }

    #[tokio::test]
    async fn metadata_frames_become_metadata_events() {
        let server = MockServer::start().await;
        let body = "data: {\"token\":\"Here\"}\n\
                    data: {\"agent_used\":\"planner\",\"tools_used\":[\"calendar\"],\"data\":{\"steps\":[\"a\"]}}\n\
                    data: [DONE]\n";
        Mock::given(method("POST"))
            .respond_with(sse(body))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let stream = client
            .stream_reply(&ChatContext::default(), "plan")
            .await
            .unwrap();
        let (text, events, error) = drain(stream).await;
        assert_eq!(text, "Here");
        assert!(error.is_none());
        let meta = events
            .iter()
            .find_map(|e| match e {
                ReplyEvent::Metadata(m) => Some(m.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(meta.agent_used.as_deref(), Some("planner"));
        assert!(meta.rich);
    }

    #[tokio::test]
    async fn error_frame_ends_stream_with_server_error() {
        let server = MockServer::start().await;
        let body = "data: {\"token\":\"Par\"}\n\
                    data: {\"error\":\"agent crashed\"}\n\
                    data: {\"token\":\"tial\"}\n\
                    data: [DONE]\n";
        Mock::given(method("POST"))
            .respond_with(sse(body))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let stream = client
            .stream_reply(&ChatContext::default(), "go")
            .await
            .unwrap();
        let (text, _, error) = drain(stream).await;
        assert_eq!(text, "Par");
        assert!(matches!(error, Some(PilotError::Server(ref m)) if m == "agent crashed"));
    }

    #[tokio::test]
    async fn non_success_status_is_typed_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_json(serde_json::json!({"detail": "Internal server error"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .stream_reply(&ChatContext::default(), "hi")
            .await
            .err()
            .unwrap();
        match err {
            PilotError::Status { status, ref body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "Internal server error");
            }
            other => panic!("expected Status, got {other:?}"),
        }
        assert!(err.user_message().contains("500"));
    }

    #[tokio::test]
    async fn empty_message_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(sse("data: [DONE]\n"))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .stream_reply(&ChatContext::default(), "   ")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PilotError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_transport_error() {
        // Port 9 (discard) on loopback is not expected to be listening.
        let client = test_client("http://127.0.0.1:9");
        let err = client
            .complete_reply(&ChatContext::default(), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::Transport { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn complete_reply_returns_content_and_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(header("x-device-id", "device-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "Your week is planned.",
                "agent_used": "planner",
                "tools_used": ["calendar"],
                "processing_time": 1.25
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let reply = client
            .complete_reply(&ChatContext::default(), "Plan my week")
            .await
            .unwrap();
        assert_eq!(reply.content, "Your week is planned.");
        assert_eq!(reply.metadata.agent_used.as_deref(), Some("planner"));
        assert_eq!(reply.metadata.processing_time, Some(1.25));
    }

    #[tokio::test]
    async fn complete_reply_rejects_garbage_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .complete_reply(&ChatContext::default(), "hi")
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::Decode { .. }));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(
            endpoint("http://localhost:8000/", "/api/chat"),
            "http://localhost:8000/api/chat"
        );
    }
}
