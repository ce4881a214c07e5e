// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! WebSocket connector for the notification channel.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use secrecy::ExposeSecret;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use lifepilot_config::model::ServerConfig;
use lifepilot_core::{Connector, CredentialProvider, InboundStream, PilotError};

/// Opens `{ws_base}/{ws_path}/{device_id}` with tokio-tungstenite.
pub struct WsConnector {
    server: ServerConfig,
    credentials: Option<Arc<dyn CredentialProvider>>,
    connect_timeout: Duration,
}

impl WsConnector {
    pub fn new(server: &ServerConfig) -> Self {
        Self {
            server: server.clone(),
            credentials: None,
            connect_timeout: Duration::from_secs(server.connect_timeout_secs),
        }
    }

    /// Sends the bearer token, when one is configured, on the upgrade request.
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    fn bearer(&self) -> Result<Option<HeaderValue>, PilotError> {
        let Some(token) = self.credentials.as_ref().and_then(|c| c.token()) else {
            return Ok(None);
        };
        let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| PilotError::Config(format!("invalid token for websocket header: {e}")))?;
        value.set_sensitive(true);
        Ok(Some(value))
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self, device_id: &str) -> Result<InboundStream, PilotError> {
        let url = self.server.notification_url(device_id)?;
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| PilotError::Config(format!("invalid notification url '{url}': {e}")))?;
        if let Some(bearer) = self.bearer()? {
            request.headers_mut().insert(header::AUTHORIZATION, bearer);
        }

        let (socket, _response) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|e| PilotError::transport(format!("timed out connecting to {url}"), e))?
            .map_err(|e| PilotError::transport(format!("failed to connect to {url}: {e}"), e))?;
        debug!(url = %url, "websocket open");

        // Text frames only; one error ends the stream.
        let inbound = stream::unfold(Some(socket), |socket| async move {
            let mut socket = socket?;
            loop {
                match socket.next().await? {
                    Ok(Message::Text(text)) => {
                        return Some((Ok(text.as_str().to_owned()), Some(socket)));
                    }
                    Ok(Message::Close(frame)) => {
                        debug!(?frame, "websocket closed by server");
                        return None;
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        let err = PilotError::transport(format!("websocket read failed: {e}"), e);
                        return Some((Err(err), None));
                    }
                }
            }
        });
        Ok(Box::pin(inbound))
    }
}

impl std::fmt::Debug for WsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsConnector")
            .field("base", &self.server.websocket_base())
            .field("authenticated", &self.credentials.is_some())
            .finish()
    }
}
