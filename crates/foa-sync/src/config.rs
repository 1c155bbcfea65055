use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::retry::RetryPolicy;

/// Tuning knobs for the sync engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SyncConfig {
    /// Upper bound on any single network call.
    pub network_timeout: Duration,
    /// Entries requested per `fetch_entries_since` call.
    pub ingest_page_size: usize,
    /// Backoff for transient failures during ingestion.
    pub retry: RetryPolicy,
    /// How often tracked chains are re-ingested.
    pub refresh_interval: Duration,
    /// How often queued writes are retried.
    pub queue_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            network_timeout: Duration::from_millis(5000),
            ingest_page_size: 100,
            retry: RetryPolicy::default(),
            refresh_interval: Duration::from_secs(60),
            queue_interval: Duration::from_secs(10),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> SyncResult<()> {
        if self.ingest_page_size == 0 {
            return Err(SyncError::Validation("ingest_page_size must be positive".into()));
        }
        if self.network_timeout.is_zero() {
            return Err(SyncError::Validation("network_timeout must be positive".into()));
        }
        if self.refresh_interval.is_zero() || self.queue_interval.is_zero() {
            return Err(SyncError::Validation("loop intervals must be positive".into()));
        }
        if self.retry.base > self.retry.max {
            return Err(SyncError::Validation(
                "retry base delay exceeds the maximum delay".into(),
            ));
        }
        Ok(())
    }
}
