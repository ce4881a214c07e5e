// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent per-device identity.
//!
//! The device id is generated once, stored under the user's data directory,
//! and reused across runs. It addresses the notification channel and is sent
//! with every chat request.

use std::path::Path;

use lifepilot_core::{CredentialProvider, PilotError};
use secrecy::SecretString;
use tracing::{debug, info};

use crate::model::IdentityConfig;

/// Environment variable consulted when no token is configured.
pub const TOKEN_ENV_VAR: &str = "LIFEPILOT_TOKEN";

/// Device id plus optional bearer token.
#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    device_id: String,
    token: Option<SecretString>,
}

impl DeviceIdentity {
    /// Resolves the identity from configuration.
    ///
    /// Device id resolution order:
    /// 1. `identity.device_id` if set
    /// 2. contents of `identity.device_id_file` if present
    /// 3. a fresh UUID v4, written to `identity.device_id_file`
    ///
    /// Token: `identity.token`, else the `LIFEPILOT_TOKEN` env var, else none.
    pub fn resolve(config: &IdentityConfig) -> Result<Self, PilotError> {
        let device_id = match config.device_id {
            Some(ref id) => id.clone(),
            None => load_or_create_device_id(Path::new(&config.device_id_file))?,
        };

        let token = config
            .token
            .clone()
            .or_else(|| std::env::var(TOKEN_ENV_VAR).ok())
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        Ok(Self { device_id, token })
    }
}

impl CredentialProvider for DeviceIdentity {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }
}

/// Reads the persisted device id, generating and persisting one if absent.
pub fn load_or_create_device_id(path: &Path) -> Result<String, PilotError> {
    match std::fs::read_to_string(path) {
        Ok(content) if !content.trim().is_empty() => {
            let id = content.trim().to_string();
            debug!(path = %path.display(), "loaded persisted device id");
            return Ok(id);
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(PilotError::Config(format!(
                "failed to read device id from {}: {e}",
                path.display()
            )));
        }
    }

    let id = uuid::Uuid::new_v4().to_string();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            PilotError::Config(format!(
                "failed to create directory {}: {e}",
                parent.display()
            ))
        })?;
    }
    std::fs::write(path, &id).map_err(|e| {
        PilotError::Config(format!(
            "failed to persist device id to {}: {e}",
            path.display()
        ))
    })?;

    info!(path = %path.display(), "generated new device id");
    Ok(id)
}
