// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP transport for the LifePilot chat API.
//!
//! This crate implements [`ChatBackend`](lifepilot_core::ChatBackend) on top
//! of reqwest, decoding the line-delimited streaming response with
//! [`FrameDecoder`], and [`HistoryStore`](lifepilot_core::HistoryStore) for
//! the history endpoint.

pub mod client;
pub mod frame;
pub mod history;
pub mod types;

pub use client::ChatClient;
pub use frame::{decode_frames, Decoded, FrameDecoder};
pub use history::HttpHistoryStore;
