// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `lifepilot chat` command implementation.
//!
//! Launches an interactive REPL with colored prompt, streaming output,
//! and readline history. Ctrl+C while a reply streams cancels it and keeps
//! the partial text; Ctrl+C before the reply opens abandons the request.

use std::future::Future;
use std::io::Write;
use std::sync::Arc;

use colored::Colorize;
use lifepilot_config::LifePilotConfig;
use lifepilot_core::{CredentialProvider, Message, MessageId, PilotError, Role};
use lifepilot_session::{ChatSession, SendOutcome, SessionOptions, SessionSnapshot, SessionState};
use lifepilot_stream::{ChatClient, HttpHistoryStore};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;

/// Slash commands understood by the REPL.
#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Quit,
    Retry,
    History,
    Clear,
    Help,
    Unknown(&'a str),
    Say(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    match line {
        "/quit" | "/exit" => Command::Quit,
        "/retry" => Command::Retry,
        "/history" => Command::History,
        "/clear" => Command::Clear,
        "/help" => Command::Help,
        other if other.starts_with('/') => Command::Unknown(other),
        other => Command::Say(other),
    }
}

/// Runs the `lifepilot chat` interactive REPL.
pub async fn run_chat(
    config: &LifePilotConfig,
    identity: Arc<dyn CredentialProvider>,
    resume: bool,
) -> Result<(), PilotError> {
    let backend = Arc::new(ChatClient::new(&config.server, Arc::clone(&identity))?);
    let history = Arc::new(HttpHistoryStore::new(&config.server, identity)?);
    let session = ChatSession::new(backend, SessionOptions::from_config(&config.chat))
        .with_history(history);

    let mut rl = DefaultEditor::new()
        .map_err(|e| PilotError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "lifepilot chat".bold().green());
    println!(
        "Type {} to exit, {} for commands. Ctrl+C cancels a pending reply.\n",
        "/quit".yellow(),
        "/help".yellow()
    );

    if resume {
        reload_history(&session).await;
    }

    let prompt = format!("{}> ", "you".green());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(&line);

                match parse_command(trimmed) {
                    Command::Quit => break,
                    Command::Help => print_help(),
                    Command::Unknown(cmd) => {
                        eprintln!("{} unknown command {cmd}; try /help", "error:".red());
                    }
                    Command::Clear => match session.clear() {
                        Ok(()) => println!("{}", "conversation cleared".dimmed()),
                        Err(e) => eprintln!("{}: {e}", "error".red()),
                    },
                    Command::History => reload_history(&session).await,
                    Command::Retry => {
                        let baseline = session.messages().len();
                        let outcome = drive(&session, baseline, session.retry_last_message()).await;
                        if outcome == SendOutcome::Ignored {
                            println!("{}", "nothing to retry".dimmed());
                        }
                    }
                    Command::Say(text) => {
                        let baseline = session.messages().len();
                        drive(&session, baseline, session.send_text(text)).await;
                    }
                }
            }
            // Ctrl+C at the prompt or Ctrl+D
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    println!("{}", "goodbye".dimmed());
    Ok(())
}

fn print_help() {
    println!("  {}   resend your last message", "/retry".yellow());
    println!("  {} reload the conversation from the server", "/history".yellow());
    println!("  {}   start over", "/clear".yellow());
    println!("  {}    exit", "/quit".yellow());
}

async fn reload_history(session: &ChatSession) {
    match session.load_history().await {
        Ok(0) => println!("{}", "no saved conversation".dimmed()),
        Ok(count) => {
            println!("{}", format!("loaded {count} messages").dimmed());
            for message in session.messages() {
                print_logged(&message);
            }
            println!();
        }
        Err(e) => eprintln!("{}: {e}", "error".red()),
    }
}

fn print_logged(message: &Message) {
    let label = match message.role {
        Role::User => "you".green(),
        Role::Assistant => "pilot".cyan(),
        Role::System => "system".dimmed(),
    };
    println!("{label}: {}", message.content);
}

/// What Ctrl+C does to a send in progress.
#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    /// Cancel the stream through the session, keeping the partial reply.
    CancelStream,
    /// Drop the pending request; the session resets itself.
    Abandon,
    Ignore,
}

fn on_interrupt(state: SessionState) -> Interrupt {
    match state {
        SessionState::Streaming => Interrupt::CancelStream,
        SessionState::Sending => Interrupt::Abandon,
        SessionState::Idle | SessionState::Error => Interrupt::Ignore,
    }
}

/// Runs one send while echoing deltas and listening for Ctrl+C.
async fn drive(
    session: &ChatSession,
    baseline: usize,
    send: impl Future<Output = SendOutcome>,
) -> SendOutcome {
    drive_until(session, baseline, send, tokio::signal::ctrl_c).await
}

async fn drive_until<I, F>(
    session: &ChatSession,
    baseline: usize,
    send: impl Future<Output = SendOutcome>,
    mut interrupt: I,
) -> SendOutcome
where
    I: FnMut() -> F,
    F: Future<Output = std::io::Result<()>>,
{
    let mut updates = session.subscribe();
    let mut printer = ReplyPrinter::new(baseline);
    let mut send = Box::pin(send);

    print!("{}: ", "pilot".cyan());
    let _ = std::io::stdout().flush();

    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome,
            changed = updates.changed() => {
                if changed.is_err() {
                    break (&mut send).await;
                }
                let snapshot = updates.borrow_and_update().clone();
                printer.observe(&snapshot);
            }
            _ = interrupt() => match on_interrupt(session.state()) {
                Interrupt::CancelStream => {
                    if session.cancel() {
                        debug!("reply cancelled from the terminal");
                    }
                }
                Interrupt::Abandon => {
                    debug!("pending request abandoned from the terminal");
                    break SendOutcome::Cancelled;
                }
                Interrupt::Ignore => {}
            },
        }
    };
    // Dropping an unfinished send resets the session before the final snapshot.
    drop(send);

    let snapshot = session.snapshot();
    match &outcome {
        SendOutcome::Completed => {
            printer.finish(&snapshot);
            println!();
            if let Some(meta) = snapshot.last_assistant().and_then(|m| m.metadata.as_ref()) {
                let mut details = Vec::new();
                if let Some(agent) = &meta.agent_used {
                    details.push(format!("agent: {agent}"));
                }
                if !meta.tools_used.is_empty() {
                    details.push(format!("tools: {}", meta.tools_used.join(", ")));
                }
                if let Some(secs) = meta.processing_time {
                    details.push(format!("{secs:.1}s"));
                }
                if !details.is_empty() {
                    println!("{}", format!("({})", details.join(" | ")).dimmed());
                }
            }
        }
        SendOutcome::Cancelled => {
            printer.finish(&snapshot);
            println!(" {}", "[cancelled]".yellow());
        }
        SendOutcome::Failed(error) => {
            println!();
            if let Some(apology) = snapshot.messages.last() {
                println!("{}: {}", "pilot".cyan(), apology.content.yellow());
            }
            eprintln!("{} {}", "error:".red(), error.message);
        }
        SendOutcome::Ignored => println!(),
    }
    outcome
}

/// Echoes the reply message's growth to stdout.
struct ReplyPrinter {
    /// Log length before the send; the reply lands after the user message.
    baseline: usize,
    reply: Option<MessageId>,
    printed: usize,
}

impl ReplyPrinter {
    fn new(baseline: usize) -> Self {
        Self {
            baseline,
            reply: None,
            printed: 0,
        }
    }

    fn observe(&mut self, snapshot: &SessionSnapshot) {
        if self.reply.is_none() {
            let streaming = snapshot
                .messages
                .iter()
                .skip(self.baseline)
                .find(|m| m.streaming && m.role == Role::Assistant);
            self.reply = streaming.map(|m| m.id.clone());
        }
        let Some(ref id) = self.reply else {
            return;
        };
        if let Some(message) = snapshot.messages.iter().find(|m| &m.id == id) {
            self.emit(message);
        }
    }

    fn finish(&mut self, snapshot: &SessionSnapshot) {
        let mut fresh = snapshot.messages.iter().skip(self.baseline);
        let message = match self.reply {
            Some(ref id) => fresh.find(|m| &m.id == id),
            None => fresh.rev().find(|m| m.role == Role::Assistant),
        };
        if let Some(message) = message {
            self.emit(message);
        }
    }

    fn emit(&mut self, message: &Message) {
        let fresh = message.content.get(self.printed..).unwrap_or_default();
        if fresh.is_empty() {
            return;
        }
        print!("{fresh}");
        let _ = std::io::stdout().flush();
        self.printed = message.content.len();
    }
}
