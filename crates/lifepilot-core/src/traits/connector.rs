// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Duplex connection trait used by the notification channel.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::PilotError;

/// Inbound text frames of an open connection.
///
/// The stream ending means the connection closed. An error item reports a
/// failure and is followed by the end of the stream. Dropping the stream
/// closes the connection.
pub type InboundStream = Pin<Box<dyn Stream<Item = Result<String, PilotError>> + Send>>;

/// Opens the persistent connection addressed by a device id.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Resolves once the connection is open.
    async fn open(&self, device_id: &str) -> Result<InboundStream, PilotError>;
}
