// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory history store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use lifepilot_core::{HistoryEntry, HistoryStore, PilotError};

/// A history store returning a fixed set of entries, or failing on demand.
pub struct MockHistoryStore {
    entries: Arc<Mutex<Vec<HistoryEntry>>>,
    fail_with: Arc<Mutex<Option<String>>>,
    fetches: AtomicUsize,
}

impl MockHistoryStore {
    pub fn new(entries: Vec<HistoryEntry>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(entries)),
            fail_with: Arc::new(Mutex::new(None)),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Convenience constructor from `(role, content, timestamp)` triples.
    pub fn from_turns(turns: &[(&str, &str, Option<&str>)]) -> Self {
        Self::new(
            turns
                .iter()
                .map(|(role, content, timestamp)| HistoryEntry {
                    role: role.to_string(),
                    content: content.to_string(),
                    timestamp: timestamp.map(str::to_string),
                })
                .collect(),
        )
    }

    /// Make the next fetch fail with a transport error.
    pub async fn fail_next(&self, reason: &str) {
        *self.fail_with.lock().await = Some(reason.to_string());
    }

    /// Number of fetches performed.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HistoryStore for MockHistoryStore {
    async fn fetch_history(&self) -> Result<Vec<HistoryEntry>, PilotError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.fail_with.lock().await.take() {
            return Err(PilotError::Transport {
                message: reason,
                source: None,
            });
        }
        Ok(self.entries.lock().await.clone())
    }
}
