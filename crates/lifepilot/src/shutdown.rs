// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal handling for the long-running `notifications` command.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Resolves with the name of the first termination signal received.
async fn termination_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                return tokio::select! {
                    _ = tokio::signal::ctrl_c() => "SIGINT",
                    _ = sigterm.recv() => "SIGTERM",
                };
            }
            Err(e) => warn!(error = %e, "SIGTERM handler unavailable; listening for Ctrl+C only"),
        }
    }
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}

/// Returns a token cancelled on SIGINT or SIGTERM.
///
/// Cancelling the token directly also stops the watcher task.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let watcher = token.clone();

    tokio::spawn(async move {
        tokio::select! {
            name = termination_signal() => {
                info!(signal = name, "shutting down");
                watcher.cancel();
            }
            _ = watcher.cancelled() => {}
        }
    });

    token
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_starts_live_and_cancels_manually() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }
}
