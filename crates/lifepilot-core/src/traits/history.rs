// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! History store trait for loading a persisted conversation.

use async_trait::async_trait;

use crate::error::PilotError;
use crate::types::HistoryEntry;

/// Source of persisted conversation history, oldest entry first.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, PilotError>;
}
