// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the chat session and the notification channel.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Locally generated identifier for a message. Unique within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        MessageId(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author of a conversation turn.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    User,
    Assistant,
    System,
}

/// Optional details the backend attaches to an assistant reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Which backend agent produced the reply.
    #[serde(default)]
    pub agent_used: Option<String>,
    /// Tools the agent invoked while producing the reply.
    #[serde(default)]
    pub tools_used: Vec<String>,
    /// Server-side processing duration in seconds.
    #[serde(default)]
    pub processing_time: Option<f64>,
    /// Structured payload accompanying the text.
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// The payload should be rendered as a rich component rather than text.
    #[serde(default)]
    pub rich: bool,
}

impl MessageMetadata {
    /// True when no field carries information.
    pub fn is_empty(&self) -> bool {
        self.agent_used.is_none()
            && self.tools_used.is_empty()
            && self.processing_time.is_none()
            && self.data.is_none()
            && !self.rich
    }

    /// Folds `other` into `self`; fields present in `other` win.
    pub fn merge(&mut self, other: MessageMetadata) {
        if other.agent_used.is_some() {
            self.agent_used = other.agent_used;
        }
        if !other.tools_used.is_empty() {
            self.tools_used = other.tools_used;
        }
        if other.processing_time.is_some() {
            self.processing_time = other.processing_time;
        }
        if other.data.is_some() {
            self.data = other.data;
        }
        self.rich |= other.rich;
    }
}

/// One turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Option<MessageMetadata>,
    /// Content is still growing. At most one message per session has this set.
    #[serde(default)]
    pub streaming: bool,
}

impl Message {
    /// A finalized message with a fresh id stamped now.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::generate(),
            role,
            content: content.into(),
            created_at: Utc::now(),
            metadata: None,
            streaming: false,
        }
    }

    /// An empty assistant message that will receive streamed deltas.
    pub fn streaming_placeholder() -> Self {
        Self {
            streaming: true,
            ..Self::new(Role::Assistant, String::new())
        }
    }

    /// Appends a delta. Ignored once the message is finalized.
    pub fn append(&mut self, delta: &str) {
        if self.streaming {
            self.content.push_str(delta);
        }
    }

    /// Freezes the content.
    pub fn finalize(&mut self) {
        self.streaming = false;
    }
}

/// A raw conversation turn as returned by the history API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Urgency of a server-pushed notification.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Priority {
    Low,
    #[default]
    #[strum(to_string = "medium", serialize = "normal")]
    Medium,
    High,
}

impl Priority {
    /// Lenient parse used for wire values; unrecognized levels map to `Medium`.
    pub fn from_wire(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

/// A server-pushed notification held in the channel backlog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub message: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    /// Only ever transitions from `false` to `true`.
    pub read: bool,
}

/// Connection state of the notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Parses a backend timestamp.
///
/// Accepts RFC 3339 and the naive ISO-8601 form the backend emits
/// (`2026-01-05T09:30:00.123456`), which is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    .map(|naive| naive.and_utc())
}
