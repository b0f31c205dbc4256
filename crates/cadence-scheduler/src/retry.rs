// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry policy: exponential backoff snapped into the delivery window.

use chrono::{DateTime, Duration, Utc};

use cadence_core::types::{DeliveryPolicy, DeliveryWindow};

use crate::window;

/// Upper bound on a single backoff delay.
pub const MAX_BACKOFF_MINUTES: u64 = 30 * 24 * 60;

/// Outcome of a retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again at `next_attempt_at` (always inside the delivery window).
    Retry { next_attempt_at: DateTime<Utc> },
    /// Retries are exhausted.
    GiveUp,
}

impl RetryDecision {
    pub fn should_retry(&self) -> bool {
        matches!(self, RetryDecision::Retry { .. })
    }

    pub fn next_attempt_at(&self) -> Option<DateTime<Utc>> {
        match self {
            RetryDecision::Retry { next_attempt_at } => Some(*next_attempt_at),
            RetryDecision::GiveUp => None,
        }
    }
}

/// Raw delay before window snapping: `backoff_minutes * 2^(attempt - 1)`,
/// capped at [`MAX_BACKOFF_MINUTES`]. Attempt 0 is treated as attempt 1.
pub fn backoff_delay(attempt: u32, backoff_minutes: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(63);
    let factor = 1u64.checked_shl(exponent).unwrap_or(u64::MAX);
    let minutes = u64::from(backoff_minutes)
        .saturating_mul(factor)
        .min(MAX_BACKOFF_MINUTES);
    // MAX_BACKOFF_MINUTES fits comfortably in i64
    Duration::minutes(minutes as i64)
}

/// Decide whether to retry and when.
///
/// `attempt` is the 1-indexed number of the attempt that just failed, i.e.
/// the attempt count after incrementing. `attempt > max_retries` gives up.
pub fn next_retry(
    now: DateTime<Utc>,
    attempt: u32,
    max_retries: u32,
    backoff_minutes: u32,
    window: &DeliveryWindow,
) -> RetryDecision {
    if attempt > max_retries {
        return RetryDecision::GiveUp;
    }
    let raw = now + backoff_delay(attempt, backoff_minutes);
    RetryDecision::Retry {
        next_attempt_at: window::next_eligible(raw, window),
    }
}

/// [`next_retry`] bound to a provider's resolved policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy<'a> {
    policy: &'a DeliveryPolicy,
}

impl<'a> RetryPolicy<'a> {
    pub fn new(policy: &'a DeliveryPolicy) -> Self {
        Self { policy }
    }

    pub fn decide(&self, now: DateTime<Utc>, attempt: u32) -> RetryDecision {
        next_retry(
            now,
            attempt,
            self.policy.max_retries,
            self.policy.retry_backoff_minutes,
            &self.policy.window,
        )
    }
}
