// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lifepilot history` command implementation.

use std::io::IsTerminal;
use std::sync::Arc;

use colored::Colorize;
use lifepilot_config::LifePilotConfig;
use lifepilot_core::types::parse_timestamp;
use lifepilot_core::{CredentialProvider, HistoryEntry, HistoryStore, PilotError};
use lifepilot_stream::HttpHistoryStore;

/// Prints the persisted conversation.
///
/// With `json` the raw entries are written as a JSON array for scripting.
/// Colors are disabled when stdout is not a TTY.
pub async fn run_history(
    config: &LifePilotConfig,
    identity: Arc<dyn CredentialProvider>,
    json: bool,
) -> Result<(), PilotError> {
    let store = HttpHistoryStore::new(&config.server, identity)?;
    let entries = store.fetch_history().await?;

    if json {
        let rendered = serde_json::to_string_pretty(&entries).map_err(|e| {
            PilotError::Internal(format!("failed to serialize history: {e}"))
        })?;
        println!("{rendered}");
        return Ok(());
    }

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }
    if entries.is_empty() {
        println!("{}", "no saved conversation".dimmed());
    }
    for entry in &entries {
        println!("{}", format_entry(entry));
    }
    Ok(())
}

fn format_entry(entry: &HistoryEntry) -> String {
    let when = entry
        .timestamp
        .as_deref()
        .and_then(parse_timestamp)
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    let role = match entry.role.as_str() {
        "user" => "you".green(),
        "assistant" => "pilot".cyan(),
        other => other.dimmed(),
    };
    format!("{} {role}: {}", when.dimmed(), entry.content)
}
