// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lifepilot notifications` command implementation.
//!
//! Keeps the notification channel open, printing each new notification
//! and every connection state change until SIGINT or SIGTERM.

use std::collections::HashSet;
use std::sync::Arc;

use colored::{ColoredString, Colorize};
use lifepilot_config::LifePilotConfig;
use lifepilot_core::{ConnectionState, CredentialProvider, Notification, PilotError, Priority};
use lifepilot_notify::{policy_from_config, NotificationChannel, WsConnector};
use tracing::info;

use crate::shutdown::install_signal_handler;

/// Runs the `lifepilot notifications` listener.
pub async fn run_notifications(
    config: &LifePilotConfig,
    identity: Arc<dyn CredentialProvider>,
) -> Result<(), PilotError> {
    if !config.notifications.enabled {
        return Err(PilotError::Config(
            "notifications are disabled (notifications.enabled = false)".to_string(),
        ));
    }

    let connector = WsConnector::new(&config.server).with_credentials(Arc::clone(&identity));
    let channel = NotificationChannel::new(
        Arc::new(connector),
        policy_from_config(&config.notifications),
    );
    let mut states = channel.watch_state();
    let mut backlog = channel.subscribe();
    let shutdown = install_signal_handler();

    info!(device_id = %identity.device_id(), "starting notification listener");
    channel.connect(identity.device_id());

    let mut seen = HashSet::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                eprintln!("{}", state_label(state));
            }
            changed = backlog.changed() => {
                if changed.is_err() {
                    break;
                }
                let fresh: Vec<Notification> = backlog
                    .borrow_and_update()
                    .iter()
                    .filter(|n| !seen.contains(&n.id))
                    .cloned()
                    .collect();
                // Backlog is newest first; print oldest first.
                for notification in fresh.into_iter().rev() {
                    print_notification(&notification);
                    seen.insert(notification.id);
                }
            }
        }
    }

    channel.disconnect();
    let unread = channel.unread_count();
    println!("{}", format!("{unread} unread notification(s)").dimmed());
    Ok(())
}

fn state_label(state: ConnectionState) -> ColoredString {
    let text = format!("[{state}]");
    match state {
        ConnectionState::Connected => text.green(),
        ConnectionState::Connecting => text.yellow(),
        ConnectionState::Disconnected => text.red(),
    }
}

fn priority_label(priority: Priority) -> ColoredString {
    let text = priority.to_string().to_uppercase();
    match priority {
        Priority::High => text.red().bold(),
        Priority::Medium => text.yellow(),
        Priority::Low => text.dimmed(),
    }
}

fn print_notification(notification: &Notification) {
    println!(
        "{} {} {}",
        notification
            .created_at
            .format("%Y-%m-%d %H:%M")
            .to_string()
            .dimmed(),
        priority_label(notification.priority),
        notification.message
    );
}
