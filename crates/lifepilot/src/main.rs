// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! LifePilot - command-line client for the LifePilot assistant.
//!
//! This is the binary entry point: streaming chat, the notification
//! listener, persisted history, and the device identity.

mod chat;
mod history;
mod notifications;
mod shutdown;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use lifepilot_config::{DeviceIdentity, LifePilotConfig};
use lifepilot_core::{CredentialProvider, PilotError};

/// LifePilot - chat with your assistant and follow its notifications.
#[derive(Parser, Debug)]
#[command(name = "lifepilot", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG lookup.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start an interactive chat session.
    Chat {
        /// Wait for complete replies instead of streaming them.
        #[arg(long)]
        no_stream: bool,
        /// Load persisted history before the first prompt.
        #[arg(long)]
        resume: bool,
    },
    /// Listen for notifications until interrupted.
    Notifications,
    /// Print the persisted conversation history.
    History {
        /// Emit JSON instead of formatted text.
        #[arg(long)]
        json: bool,
    },
    /// Print this device's identifier.
    Identity,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match cli.config {
        Some(ref path) => lifepilot_config::load_and_validate_path(path),
        None => lifepilot_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            lifepilot_config::render_errors(&errors);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.client.log_level);

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", "error".red());
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Option<Commands>, mut config: LifePilotConfig) -> Result<(), PilotError> {
    let identity: Arc<dyn CredentialProvider> =
        Arc::new(DeviceIdentity::resolve(&config.identity)?);

    match command {
        Some(Commands::Chat { no_stream, resume }) => {
            if no_stream {
                config.chat.streaming = false;
            }
            chat::run_chat(&config, identity, resume).await
        }
        Some(Commands::Notifications) => notifications::run_notifications(&config, identity).await,
        Some(Commands::History { json }) => history::run_history(&config, identity, json).await,
        Some(Commands::Identity) => {
            println!("{}", identity.device_id());
            Ok(())
        }
        None => {
            println!("lifepilot: use --help for available commands");
            Ok(())
        }
    }
}

/// Initializes the tracing subscriber with the given log level.
///
/// Logs go to stderr so they never interleave with streamed replies.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lifepilot={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
