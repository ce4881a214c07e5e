// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LifePilot chat API request/response types and stream frame types.

use lifepilot_core::{ChatReply, HistoryEntry, MessageMetadata};
use serde::{Deserialize, Serialize};

// --- Request types ---

/// Body of both the streaming and the single-shot chat request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    /// Per-device correlation id.
    pub correlation_id: String,
    /// The user's message, already trimmed.
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

// --- Response types ---

/// Single-shot chat response.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub agent_used: Option<String>,
    #[serde(default)]
    pub tools_used: Option<Vec<String>>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Rendering hint, e.g. `"plan"` or `"text"`.
    #[serde(default)]
    pub message_type: Option<String>,
}

impl From<ChatResponse> for ChatReply {
    fn from(resp: ChatResponse) -> Self {
        let rich = resp.data.is_some() || resp.message_type.as_deref().is_some_and(|t| t != "text");
        ChatReply {
            content: resp.response,
            metadata: MessageMetadata {
                agent_used: resp.agent_used,
                tools_used: resp.tools_used.unwrap_or_default(),
                processing_time: resp.processing_time,
                data: resp.data,
                rich,
            },
        }
    }
}

/// Error body returned with non-success statuses (FastAPI style).
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub detail: serde_json::Value,
}

impl ApiErrorResponse {
    /// The detail as display text.
    pub fn detail_text(&self) -> String {
        match self.detail {
            serde_json::Value::String(ref s) => s.clone(),
            ref other => other.to_string(),
        }
    }
}

/// Chat history response.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<HistoryEntry>,
}

// --- Stream frame types ---

/// One decoded `data:` frame of the streaming response.
///
/// Every field is optional; a frame may carry a token, metadata, an error,
/// or any combination.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct StreamFrame {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub agent_used: Option<String>,
    #[serde(default)]
    pub tools_used: Option<Vec<String>>,
    #[serde(default)]
    pub processing_time: Option<f64>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl StreamFrame {
    /// Metadata carried by this frame, if any.
    pub fn metadata(&self) -> Option<MessageMetadata> {
        let meta = MessageMetadata {
            agent_used: self.agent_used.clone(),
            tools_used: self.tools_used.clone().unwrap_or_default(),
            processing_time: self.processing_time,
            data: self.data.clone(),
            rich: self.data.is_some(),
        };
        (!meta.is_empty()).then_some(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_omits_missing_system_prompt() {
        let req = ChatRequest {
            correlation_id: "dev-1".into(),
            message: "Plan my week".into(),
            system_prompt: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"correlation_id": "dev-1", "message": "Plan my week"})
        );
    }

    #[test]
    fn token_only_frame_has_no_metadata() {
        let frame: StreamFrame = serde_json::from_str(r#"{"token":"Sure"}"#).unwrap();
        assert_eq!(frame.token.as_deref(), Some("Sure"));
        assert!(frame.metadata().is_none());
    }

    #[test]
    fn frame_with_payload_is_rich() {
        let frame: StreamFrame =
            serde_json::from_str(r#"{"agent_used":"planner","data":{"steps":[]}}"#).unwrap();
        let meta = frame.metadata().unwrap();
        assert_eq!(meta.agent_used.as_deref(), Some("planner"));
        assert!(meta.rich);
    }

    #[test]
    fn chat_response_converts_to_reply() {
        let resp: ChatResponse = serde_json::from_str(
            r#"{"response":"Done.","agent_used":"executor","tools_used":["calendar"],"processing_time":0.4,"message_type":"text"}"#,
        )
        .unwrap();
        let reply = ChatReply::from(resp);
        assert_eq!(reply.content, "Done.");
        assert_eq!(reply.metadata.tools_used, vec!["calendar"]);
        assert!(!reply.metadata.rich);
    }

    #[test]
    fn error_detail_may_be_structured() {
        let err: ApiErrorResponse =
            serde_json::from_str(r#"{"detail":[{"msg":"field required"}]}"#).unwrap();
        assert!(err.detail_text().contains("field required"));

        let err: ApiErrorResponse =
            serde_json::from_str(r#"{"detail":"Internal server error"}"#).unwrap();
        assert_eq!(err.detail_text(), "Internal server error");
    }
}
