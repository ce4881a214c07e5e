// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for LifePilot integration tests.
//!
//! Provides scripted collaborators for fast, deterministic, CI-runnable
//! tests without a running backend.
//!
//! # Components
//!
//! - [`MockChatBackend`] - Chat backend replaying scripted replies
//! - [`MockHistoryStore`] - History store with fixed entries
//! - [`MockConnector`] - Duplex connector with scripted connection outcomes

pub mod mock_backend;
pub mod mock_connector;
pub mod mock_history;

pub use mock_backend::{LiveReply, MockChatBackend, RecordedRequest, ScriptedReply};
pub use mock_connector::{MockConnector, ServerHandle};
pub use mock_history::MockHistoryStore;
