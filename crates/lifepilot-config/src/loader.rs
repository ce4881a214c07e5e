// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./lifepilot.toml` > `~/.config/lifepilot/lifepilot.toml`
//! > `/etc/lifepilot/lifepilot.toml` with environment variable overrides via
//! the `LIFEPILOT_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::LifePilotConfig;

/// System-wide configuration file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/lifepilot/lifepilot.toml";

/// Configuration file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "lifepilot.toml";

/// Per-user configuration file under the XDG config directory.
pub fn user_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("lifepilot").join(LOCAL_CONFIG_FILE))
        .unwrap_or_default()
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/lifepilot/lifepilot.toml`
/// 3. `~/.config/lifepilot/lifepilot.toml`
/// 4. `./lifepilot.toml`
/// 5. `LIFEPILOT_*` environment variables
pub fn load_config() -> Result<LifePilotConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<LifePilotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LifePilotConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<LifePilotConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(LifePilotConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for the XDG lookup, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(LifePilotConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Environment provider with an explicit section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` because key names contain
/// underscores: `LIFEPILOT_SERVER_BASE_URL` must map to `server.base_url`,
/// not `server.base.url`. `LIFEPILOT_TOKEN` is shorthand for `identity.token`.
fn env_provider() -> Env {
    Env::prefixed("LIFEPILOT_").map(|key| {
        let key_str = key.as_str();
        if key_str == "token" {
            return "identity.token".into();
        }
        let mapped = key_str
            .replacen("client_", "client.", 1)
            .replacen("server_", "server.", 1)
            .replacen("chat_", "chat.", 1)
            .replacen("notifications_", "notifications.", 1)
            .replacen("identity_", "identity.", 1);
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_nested_keys() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("LIFEPILOT_SERVER_BASE_URL", "https://api.example.com");
            jail.set_env("LIFEPILOT_NOTIFICATIONS_RECONNECT_DELAY_MS", "500");
            jail.set_env("LIFEPILOT_TOKEN", "secret-token");
            let config = load_config_from_path(Path::new("missing.toml"))?;
            assert_eq!(config.server.base_url, "https://api.example.com");
            assert_eq!(config.notifications.reconnect_delay_ms, 500);
            assert_eq!(config.identity.token.as_deref(), Some("secret-token"));
            Ok(())
        });
    }

    #[test]
    fn local_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                LOCAL_CONFIG_FILE,
                r#"
[chat]
streaming = false
"#,
            )?;
            let config = load_config()?;
            assert!(!config.chat.streaming);
            Ok(())
        });
    }
}
