//! Retry wrapper for provider calls.

use super::RetryPolicy;
use crate::sync::ports::{ProviderError, ProviderResult};
use std::future::Future;
use tracing::warn;

/// Result of a retried call together with the number of calls made.
#[derive(Debug)]
pub struct Attempted<T> {
    /// Final result.
    pub result: ProviderResult<T>,
    /// Calls made, at least one.
    pub attempts: u32,
}

impl<T> Attempted<T> {
    /// Returns `true` when the call was repeated at least once.
    #[must_use]
    pub const fn retried(&self) -> bool {
        self.attempts > 1
    }
}

/// Runs `operation`, repeating it after a backoff delay while it fails with
/// a retryable error and retries remain.
///
/// Terminal and token-expiry errors are returned after a single call; the
/// sleeps yield to the runtime instead of blocking the thread.
pub async fn call_with_retry<T, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Attempted<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProviderResult<T>>,
{
    let mut attempts: u32 = 0;
    loop {
        attempts = attempts.saturating_add(1);
        let err: ProviderError = match operation().await {
            Ok(value) => {
                return Attempted {
                    result: Ok(value),
                    attempts,
                };
            }
            Err(err) => err,
        };
        let retries_used = attempts.saturating_sub(1);
        if !err.is_retryable() || retries_used >= policy.max_retries {
            return Attempted {
                result: Err(err),
                attempts,
            };
        }
        let delay = policy.delay_for(retries_used);
        warn!(
            attempt = attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "retryable provider error; backing off"
        );
        tokio::time::sleep(delay).await;
    }
}
