// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state for the LifePilot client.
//!
//! The [`ChatSession`] owns the ordered message log and coordinates:
//! - Sending the user's input through a [`ChatBackend`](lifepilot_core::ChatBackend)
//! - Appending streamed deltas to the in-progress assistant message
//! - Cancelling a stream while keeping the partial reply
//! - Surfacing failures as an apology message plus a dismissible error
//! - Replacing the log from persisted history

pub mod session;

pub use session::{
    ChatSession, SendOutcome, SessionError, SessionOptions, SessionSnapshot, SessionState,
};
