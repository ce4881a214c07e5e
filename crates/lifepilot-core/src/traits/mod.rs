// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits at the seams of the client core.
//!
//! Async traits use `#[async_trait]` so they can be held as trait objects.

pub mod chat;
pub mod connector;
pub mod credential;
pub mod history;

pub use chat::{ChatBackend, ChatContext, ChatReply, ReplyEvent, ReplyStream};
pub use connector::{Connector, InboundStream};
pub use credential::{CredentialProvider, StaticCredentials};
pub use history::HistoryStore;
