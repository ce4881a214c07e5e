// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the LifePilot client.
//!
//! Holds the error type, the conversation and notification domain types,
//! and the traits implemented by the HTTP, history, credential and
//! connection collaborators.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::{ErrorKind, PilotError};
pub use types::{
    ConnectionState, HistoryEntry, Message, MessageId, MessageMetadata, Notification, Priority,
    Role,
};

pub use traits::{
    ChatBackend, ChatContext, ChatReply, Connector, CredentialProvider, HistoryStore,
    InboundStream, ReplyEvent, ReplyStream, StaticCredentials,
};
