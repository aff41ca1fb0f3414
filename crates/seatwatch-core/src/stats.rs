//! Command usage counters
//!
//! Counts are accumulated in memory and added to the persisted totals by a
//! background task, periodically and once more on shutdown. A flush drains
//! the in-memory counts; a failed flush puts them back for the next attempt.

#[cfg(test)]
mod tests;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Default interval between persisted flushes
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Durable storage for usage totals
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Add `counts` to the stored totals
    async fn add_counts(&self, counts: &[(String, i64)]) -> Result<()>;

    /// Stored totals, highest first
    async fn load_counts(&self) -> Result<Vec<(String, i64)>>;
}

/// In-memory counters waiting to be persisted
#[derive(Default)]
pub struct UsageStats {
    pending: Mutex<HashMap<String, i64>>,
}

impl UsageStats {
    /// Empty counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `action`
    pub async fn record(&self, action: impl Into<String>) {
        *self.pending.lock().await.entry(action.into()).or_insert(0) += 1;
    }

    /// Counts not yet persisted
    pub async fn pending(&self) -> HashMap<String, i64> {
        self.pending.lock().await.clone()
    }

    /// Persist and reset the pending counts; returns how many actions were written
    pub async fn flush(&self, store: &dyn StatsStore) -> Result<usize> {
        let drained: Vec<(String, i64)> = self.pending.lock().await.drain().collect();
        if drained.is_empty() {
            return Ok(0);
        }

        if let Err(e) = store.add_counts(&drained).await {
            let mut pending = self.pending.lock().await;
            for (action, count) in drained {
                *pending.entry(action).or_insert(0) += count;
            }
            return Err(e);
        }

        debug!(actions = drained.len(), "Usage counters flushed");
        Ok(drained.len())
    }

    /// Flush every `interval` until cancelled, then flush once more
    pub async fn run(
        self: Arc<Self>,
        store: Arc<dyn StatsStore>,
        interval: Duration,
        token: CancellationToken,
    ) {
        info!(interval_secs = interval.as_secs(), "Usage stats flusher started");
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.flush(store.as_ref()).await {
                        warn!(error = %e, "Failed to persist usage counters");
                    }
                }
            }
        }

        match self.flush(store.as_ref()).await {
            Ok(written) => info!(actions = written, "Usage stats flusher stopped"),
            Err(e) => warn!(error = %e, "Final usage counter flush failed"),
        }
    }
}
