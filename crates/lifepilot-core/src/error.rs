// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the LifePilot client core.

use strum::{Display, EnumString};
use thiserror::Error;

/// The primary error type used across the chat, history, and notification paths.
#[derive(Debug, Error)]
pub enum PilotError {
    /// Configuration errors (invalid URL, missing identity, bad header value).
    #[error("configuration error: {0}")]
    Config(String),

    /// The caller supplied input that cannot be sent (e.g. an empty message).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The operation conflicts with an in-flight send.
    #[error("session busy: {0}")]
    Busy(String),

    /// Network-level failure (connection refused, reset, aborted mid-flight).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The server answered with a non-success status code.
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response stream closed before the `[DONE]` terminator was seen.
    #[error("stream closed before completion")]
    TruncatedStream,

    /// The server reported an error inside an otherwise healthy stream.
    #[error("server error: {0}")]
    Server(String),

    /// A response body could not be decoded.
    #[error("decode error: {message}")]
    Decode {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Discriminant of [`PilotError`], cheap to copy into UI-facing snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    Config,
    InvalidInput,
    Busy,
    Transport,
    Status,
    TruncatedStream,
    Server,
    Decode,
    Internal,
}

impl PilotError {
    /// Shorthand for a transport error wrapping its cause.
    pub fn transport<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PilotError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PilotError::Config(_) => ErrorKind::Config,
            PilotError::InvalidInput(_) => ErrorKind::InvalidInput,
            PilotError::Busy(_) => ErrorKind::Busy,
            PilotError::Transport { .. } => ErrorKind::Transport,
            PilotError::Status { .. } => ErrorKind::Status,
            PilotError::TruncatedStream => ErrorKind::TruncatedStream,
            PilotError::Server(_) => ErrorKind::Server,
            PilotError::Decode { .. } => ErrorKind::Decode,
            PilotError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Human-readable reason suitable for the session's error slot.
    pub fn user_message(&self) -> String {
        match self {
            PilotError::Transport { message, .. } => {
                format!("Could not reach the assistant: {message}")
            }
            PilotError::Status { status, .. } => {
                format!("The assistant returned an error (HTTP {status}).")
            }
            PilotError::TruncatedStream => {
                "The response was interrupted before it finished.".to_string()
            }
            PilotError::Server(message) => format!("The assistant reported an error: {message}"),
            other => other.to_string(),
        }
    }
}
