// SPDX-FileCopyrightText: 2026 LifePilot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconnection policies for the notification channel.
//!
//! A policy maps the number of consecutive failed or closed connections to
//! the delay before the next attempt, or to `None` when the channel should
//! stop retrying.

use std::sync::Arc;
use std::time::Duration;

use lifepilot_config::model::{BackoffKind, NotificationsConfig};
use rand::Rng;

/// Decides when (and whether) the channel reconnects.
pub trait ReconnectPolicy: Send + Sync + std::fmt::Debug {
    /// Delay before the next attempt. `attempt` starts at 1 for the first
    /// reconnection after a close and resets once a connection opens.
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

/// Same delay before every attempt.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
    pub jitter: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
            jitter: Duration::ZERO,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }
}

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if exhausted(attempt, self.max_attempts) {
            return None;
        }
        Some(self.delay + jitter(self.jitter))
    }
}

/// Delay doubling per consecutive attempt, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
    pub max_attempts: Option<u32>,
    pub jitter: Duration,
}

impl ReconnectPolicy for ExponentialBackoff {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        if exhausted(attempt, self.max_attempts) {
            return None;
        }
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        let delay = self.base.saturating_mul(factor).min(self.max);
        Some(delay + jitter(self.jitter))
    }
}

fn exhausted(attempt: u32, max_attempts: Option<u32>) -> bool {
    max_attempts.is_some_and(|max| attempt > max)
}

fn jitter(bound: Duration) -> Duration {
    if bound.is_zero() {
        return Duration::ZERO;
    }
    let millis = u64::try_from(bound.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
}

/// Builds the policy described by the `[notifications]` section.
pub fn policy_from_config(config: &NotificationsConfig) -> Arc<dyn ReconnectPolicy> {
    let delay = Duration::from_millis(config.reconnect_delay_ms);
    let jitter = Duration::from_millis(config.jitter_ms);
    match config.backoff {
        BackoffKind::Fixed => Arc::new(FixedDelay {
            delay,
            max_attempts: config.max_attempts,
            jitter,
        }),
        BackoffKind::Exponential => Arc::new(ExponentialBackoff {
            base: delay,
            max: Duration::from_millis(config.max_delay_ms).max(delay),
            max_attempts: config.max_attempts,
            jitter,
        }),
    }
}
