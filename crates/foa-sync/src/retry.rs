//! Timeouts and exponential backoff around network calls.

use std::future::Future;
use std::time::Duration;

use foa_network::{NetworkError, NetworkResult};
use tracing::debug;

use crate::error::SyncResult;

/// Exponential backoff: `base`, doubling per attempt, capped at `max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub attempts: u32,
    pub base: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            base: Duration::from_millis(200),
            max: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (zero-based).
    pub fn delay(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.min(16);
        self.base.saturating_mul(factor).min(self.max)
    }
}

/// Run a network call under `limit`. An elapsed timer is reported as
/// `Unavailable`.
pub async fn timed<T, F>(limit: Duration, call: F) -> NetworkResult<T>
where
    F: Future<Output = NetworkResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(NetworkError::Unavailable(format!(
            "network call timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

/// Run `op` until it succeeds, fails permanently, or the retries run out.
///
/// Only transient errors are retried.
pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> SyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SyncResult<T>>,
{
    let mut retry = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && retry < policy.attempts => {
                let delay = policy.delay(retry);
                debug!(error = %err, retry, delay_ms = delay.as_millis() as u64, "retrying");
                tokio::time::sleep(delay).await;
                retry += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
