// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential provider trait.

use secrecy::SecretString;

/// Supplies the identity attached to every outbound request.
///
/// The core only reads these values. Token issuance and refresh live
/// elsewhere.
pub trait CredentialProvider: Send + Sync {
    /// Stable per-device correlation id. Addresses the notification channel.
    fn device_id(&self) -> &str;

    /// Opaque bearer token, if the user is signed in.
    fn token(&self) -> Option<&SecretString>;
}

/// Fixed credentials, mostly useful for tests and one-off tools.
#[derive(Debug, Clone)]
pub struct StaticCredentials {
    device_id: String,
    token: Option<SecretString>,
}

impl StaticCredentials {
    pub fn new(device_id: impl Into<String>, token: Option<String>) -> Self {
        Self {
            device_id: device_id.into(),
            token: token.map(SecretString::from),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn token(&self) -> Option<&SecretString> {
        self.token.as_ref()
    }
}
