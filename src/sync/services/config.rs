//! Push and retry configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounded exponential backoff for retryable provider errors.
///
/// The delay before retry `n` (counting from zero) is
/// `min(base_delay_ms * multiplier^n, max_delay_ms)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Growth factor between consecutive delays.
    pub multiplier: u32,
    /// Upper bound of any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 200,
            multiplier: 2,
            max_delay_ms: 5_000,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub const NONE: Self = Self {
        max_retries: 0,
        base_delay_ms: 0,
        multiplier: 1,
        max_delay_ms: 0,
    };

    /// Returns the delay before retry `retry` (zero-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = u64::from(self.multiplier)
            .checked_pow(retry)
            .unwrap_or(u64::MAX);
        let millis = self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms);
        Duration::from_millis(millis)
    }
}

/// Settings of the push orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Retry policy for provider calls.
    pub retry: RetryPolicy,
    /// Access tokens expiring within this many seconds are refreshed before
    /// the first call of a run.
    pub refresh_skew_secs: u32,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            refresh_skew_secs: 60,
        }
    }
}

impl PushConfig {
    /// Returns the proactive refresh window.
    #[must_use]
    pub fn refresh_skew(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.refresh_skew_secs))
    }
}
