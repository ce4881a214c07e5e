// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP history store backed by the chat history endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use lifepilot_config::model::ServerConfig;
use lifepilot_core::{CredentialProvider, HistoryEntry, HistoryStore, PilotError};
use tracing::debug;

use crate::client::{build_http_client, check_status, endpoint};
use crate::types::HistoryResponse;

/// Reads persisted conversation history with a `GET`.
#[derive(Debug, Clone)]
pub struct HttpHistoryStore {
    client: reqwest::Client,
    url: String,
}

impl HttpHistoryStore {
    pub fn new(
        server: &ServerConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, PilotError> {
        Ok(Self {
            client: build_http_client(server, credentials.as_ref())?,
            url: endpoint(&server.base_url, &server.history_path),
        })
    }
}

#[async_trait]
impl HistoryStore for HttpHistoryStore {
    async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, PilotError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PilotError::transport(format!("history request failed: {e}"), e))?;
        let response = check_status(response).await?;

        let body = response
            .text()
            .await
            .map_err(|e| PilotError::transport(format!("failed to read history body: {e}"), e))?;
        let parsed: HistoryResponse =
            serde_json::from_str(&body).map_err(|e| PilotError::Decode {
                message: format!("failed to parse history response: {e}"),
                source: Some(Box::new(e)),
            })?;

        debug!(count = parsed.messages.len(), "history fetched");
        Ok(parsed.messages)
    }
}
