// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Server-pushed notifications for the LifePilot client.
//!
//! [`NotificationChannel`] keeps a persistent websocket open per device,
//! reconnects according to a [`ReconnectPolicy`], and exposes the received
//! notifications as an observable backlog.

pub mod channel;
pub mod event;
pub mod reconnect;
pub mod transport;

pub use channel::NotificationChannel;
pub use event::{parse_event, InboundEvent};
pub use reconnect::{policy_from_config, ExponentialBackoff, FixedDelay, ReconnectPolicy};
pub use transport::WsConnector;
