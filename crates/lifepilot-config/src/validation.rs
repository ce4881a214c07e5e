// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as URL schemes, non-zero delays, and endpoint paths.

use crate::diagnostic::ConfigError;
use crate::model::{BackoffKind, LifePilotConfig};

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &LifePilotConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.client.log_level.to_ascii_lowercase().as_str()) {
        fail(format!(
            "client.log_level `{}` is not one of {}",
            config.client.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    let base = config.server.base_url.trim();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        fail(format!(
            "server.base_url `{base}` must start with http:// or https://"
        ));
    }

    if let Some(ref ws) = config.server.ws_url {
        let ws = ws.trim();
        if !(ws.starts_with("ws://") || ws.starts_with("wss://")) {
            fail(format!("server.ws_url `{ws}` must start with ws:// or wss://"));
        }
    }

    for (key, path) in [
        ("server.chat_path", &config.server.chat_path),
        ("server.stream_path", &config.server.stream_path),
        ("server.history_path", &config.server.history_path),
        ("server.ws_path", &config.server.ws_path),
    ] {
        if !path.starts_with('/') {
            fail(format!("{key} `{path}` must start with `/`"));
        }
    }

    if config.server.connect_timeout_secs == 0 {
        fail("server.connect_timeout_secs must be greater than 0".to_string());
    }

    let notifications = &config.notifications;
    if notifications.reconnect_delay_ms == 0 {
        fail("notifications.reconnect_delay_ms must be greater than 0".to_string());
    }

    if notifications.jitter_ms > notifications.reconnect_delay_ms {
        fail(format!(
            "notifications.jitter_ms ({}) must not exceed notifications.reconnect_delay_ms ({})",
            notifications.jitter_ms, notifications.reconnect_delay_ms
        ));
    }

    if notifications.backoff == BackoffKind::Exponential
        && notifications.max_delay_ms < notifications.reconnect_delay_ms
    {
        fail(format!(
            "notifications.max_delay_ms ({}) must be at least notifications.reconnect_delay_ms ({})",
            notifications.max_delay_ms, notifications.reconnect_delay_ms
        ));
    }

    if notifications.max_attempts == Some(0) {
        fail("notifications.max_attempts must be at least 1 when set".to_string());
    }

    if let Some(ref id) = config.identity.device_id {
        if id.trim().is_empty() || id.contains('/') {
            fail("identity.device_id must be non-empty and must not contain `/`".to_string());
        }
    }

    if config.identity.device_id_file.trim().is_empty() {
        fail("identity.device_id_file must not be empty".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(config: &LifePilotConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.to_string())
            .collect()
    }

    #[test]
    fn default_config_validates() {
        let config = LifePilotConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn non_http_base_url_fails_validation() {
        let mut config = LifePilotConfig::default();
        config.server.base_url = "localhost:8000".to_string();
        let errors = messages(&config);
        assert!(errors.iter().any(|m| m.contains("server.base_url")));
    }

    #[test]
    fn zero_reconnect_delay_fails_validation() {
        let mut config = LifePilotConfig::default();
        config.notifications.reconnect_delay_ms = 0;
        let errors = messages(&config);
        assert!(errors.iter().any(|m| m.contains("reconnect_delay_ms")));
    }

    #[test]
    fn jitter_larger_than_delay_fails_validation() {
        let mut config = LifePilotConfig::default();
        config.notifications.jitter_ms = 10_000;
        let errors = messages(&config);
        assert!(errors.iter().any(|m| m.contains("jitter_ms")));
    }

    #[test]
    fn collects_all_errors_instead_of_failing_fast() {
        let mut config = LifePilotConfig::default();
        config.server.base_url = "ftp://nope".to_string();
        config.server.chat_path = "api/chat".to_string();
        config.client.log_level = "loud".to_string();
        config.notifications.max_attempts = Some(0);
        assert_eq!(messages(&config).len(), 4);
    }

    #[test]
    fn device_id_with_slash_fails_validation() {
        let mut config = LifePilotConfig::default();
        config.identity.device_id = Some("a/b".to_string());
        let errors = messages(&config);
        assert!(errors.iter().any(|m| m.contains("identity.device_id")));
    }

    #[test]
    fn exponential_backoff_requires_sane_cap() {
        let mut config = LifePilotConfig::default();
        config.notifications.backoff = BackoffKind::Exponential;
        config.notifications.max_delay_ms = 100;
        let errors = messages(&config);
        assert!(errors.iter().any(|m| m.contains("max_delay_ms")));
    }
}
