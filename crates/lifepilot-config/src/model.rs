// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the LifePilot client.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use lifepilot_core::PilotError;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Top-level LifePilot configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LifePilotConfig {
    /// Process-level settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Backend endpoints.
    #[serde(default)]
    pub server: ServerConfig,

    /// Chat session behavior.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Notification channel and reconnection policy.
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Device identity and credential.
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Backend endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Base URL of the HTTP API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Base URL of the websocket endpoint. Derived from `base_url` when unset.
    #[serde(default)]
    pub ws_url: Option<String>,

    /// Path of the single-shot chat endpoint.
    #[serde(default = "default_chat_path")]
    pub chat_path: String,

    /// Path of the streaming chat endpoint.
    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    /// Path of the chat history endpoint.
    #[serde(default = "default_history_path")]
    pub history_path: String,

    /// Path prefix of the notification socket; the device id is appended.
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Timeout for establishing connections, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            ws_url: None,
            chat_path: default_chat_path(),
            stream_path: default_stream_path(),
            history_path: default_history_path(),
            ws_path: default_ws_path(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ServerConfig {
    /// Websocket base URL: `ws_url` if set, else `base_url` with its scheme
    /// swapped (`http` -> `ws`, `https` -> `wss`).
    pub fn websocket_base(&self) -> String {
        if let Some(ref ws) = self.ws_url {
            return ws.trim_end_matches('/').to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            base.to_string()
        }
    }

    /// Full websocket address of the notification channel for `device_id`.
    ///
    /// The device id is one percent-encoded path segment.
    pub fn notification_url(&self, device_id: &str) -> Result<String, PilotError> {
        let base = self.websocket_base();
        let mut url = Url::parse(&base)
            .map_err(|e| PilotError::Config(format!("invalid websocket url `{base}`: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| PilotError::Config(format!("websocket url `{base}` cannot take a path")))?
            .pop_if_empty()
            .extend(self.ws_path.split('/').filter(|s| !s.is_empty()))
            .push(device_id);
        Ok(url.into())
    }
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_chat_path() -> String {
    "/api/chat".to_string()
}

fn default_stream_path() -> String {
    "/api/chat/stream".to_string()
}

fn default_history_path() -> String {
    "/api/chat/history".to_string()
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Chat session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatConfig {
    /// Use the streaming endpoint. When false, replies arrive in one piece.
    #[serde(default = "default_streaming")]
    pub streaming: bool,

    /// Inline system prompt string. Overridden by `system_prompt_file` if both set.
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Path to a file containing the system prompt.
    /// Takes precedence over `system_prompt` if both are set.
    #[serde(default)]
    pub system_prompt_file: Option<String>,

    /// Assistant text appended to the log when a send fails.
    #[serde(default = "default_apology_message")]
    pub apology_message: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            streaming: default_streaming(),
            system_prompt: None,
            system_prompt_file: None,
            apology_message: default_apology_message(),
        }
    }
}

fn default_streaming() -> bool {
    true
}

fn default_apology_message() -> String {
    "Sorry, I couldn't complete that request. Please try again.".to_string()
}

/// Reconnect backoff strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same delay before every attempt.
    #[default]
    Fixed,
    /// Delay doubles per consecutive failure, capped at `max_delay_ms`.
    Exponential,
}

/// Notification channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationsConfig {
    /// Open the notification channel at startup.
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,

    /// Backoff strategy between reconnection attempts.
    #[serde(default)]
    pub backoff: BackoffKind,

    /// Base delay before a reconnection attempt, in milliseconds.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Upper bound for exponential backoff, in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Give up after this many consecutive failed attempts. `None` retries forever.
    #[serde(default)]
    pub max_attempts: Option<u32>,

    /// Random jitter added to each delay, in milliseconds.
    #[serde(default)]
    pub jitter_ms: u64,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            backoff: BackoffKind::default(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: None,
            jitter_ms: 0,
        }
    }
}

fn default_notifications_enabled() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

/// Device identity configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IdentityConfig {
    /// Fixed device id. When unset, one is generated and persisted.
    #[serde(default)]
    pub device_id: Option<String>,

    /// File holding the persisted device id.
    #[serde(default = "default_device_id_file")]
    pub device_id_file: String,

    /// Opaque bearer token. `None` falls back to `LIFEPILOT_TOKEN`.
    #[serde(default)]
    pub token: Option<String>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            device_id_file: default_device_id_file(),
            token: None,
        }
    }
}

fn default_device_id_file() -> String {
    dirs::data_dir()
        .map(|p| p.join("lifepilot").join("device_id"))
        .unwrap_or_else(|| std::path::PathBuf::from("lifepilot_device_id"))
        .to_string_lossy()
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_base_is_derived_from_http_base() {
        let mut server = ServerConfig::default();
        assert_eq!(server.websocket_base(), "ws://localhost:8000");

        server.base_url = "https://pilot.example.com/".into();
        assert_eq!(server.websocket_base(), "wss://pilot.example.com");

        server.ws_url = Some("wss://push.example.com/".into());
        assert_eq!(server.websocket_base(), "wss://push.example.com");
    }

    #[test]
    fn notification_url_appends_device_id() {
        let server = ServerConfig::default();
        assert_eq!(
            server.notification_url("abc-123").unwrap(),
            "ws://localhost:8000/ws/abc-123"
        );
    }

    #[test]
    fn notification_url_encodes_device_id() {
        let mut server = ServerConfig {
            ws_url: Some("wss://push.example.com/base/".into()),
            ws_path: "/socket/v1/".into(),
            ..Default::default()
        };
        assert_eq!(
            server.notification_url("a/b?c#d").unwrap(),
            "wss://push.example.com/base/socket/v1/a%2Fb%3Fc%23d"
        );

        server.ws_url = Some("not a url".into());
        assert!(matches!(
            server.notification_url("abc-123"),
            Err(PilotError::Config(_))
        ));
    }

    #[test]
    fn backoff_kind_deserializes_lowercase() {
        let cfg: NotificationsConfig = toml::from_str("backoff = \"exponential\"").unwrap();
        assert_eq!(cfg.backoff, BackoffKind::Exponential);
        assert_eq!(cfg.reconnect_delay_ms, 3000);
    }
}
