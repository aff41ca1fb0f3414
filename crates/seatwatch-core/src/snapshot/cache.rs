//! Stale-serving snapshot cache

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{info, warn};

use super::feed::FeedSource;
use super::parser::FeedParser;
use super::types::{Group, ResourceRecord, Snapshot};
use crate::error::Result;

#[derive(Default)]
struct CacheState {
    snapshot: Option<Arc<Snapshot>>,
    refreshed_at: Option<Instant>,
}

/// Holds the latest successfully parsed [`Snapshot`]
///
/// A failed refresh never clears what is already cached: readers keep
/// getting the previous snapshot until a refresh succeeds.
pub struct SnapshotCache {
    source: Box<dyn FeedSource>,
    parser: Box<dyn FeedParser>,
    staleness: Duration,
    state: RwLock<CacheState>,
    refresh_lock: Mutex<()>,
}

impl SnapshotCache {
    /// Create an empty cache; nothing is fetched until the first refresh or lookup
    pub fn new(
        source: Box<dyn FeedSource>,
        parser: Box<dyn FeedParser>,
        staleness: Duration,
    ) -> Self {
        Self {
            source,
            parser,
            staleness,
            state: RwLock::new(CacheState::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Fetch and parse the feed now, replacing the cached snapshot on success
    pub async fn refresh(&self) -> Result<Arc<Snapshot>> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<Arc<Snapshot>> {
        let fetched = self.source.fetch().await.and_then(|bytes| self.parser.parse(&bytes));
        let parsed = match fetched {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(
                    source = %self.source.describe(),
                    error = %e,
                    "Feed refresh failed, keeping previous snapshot"
                );
                return Err(e);
            }
        };

        let snapshot = Arc::new(Snapshot::from_parsed(parsed, Utc::now()));
        {
            let mut state = self.state.write().await;
            state.snapshot = Some(snapshot.clone());
            state.refreshed_at = Some(Instant::now());
        }

        info!(
            label = %snapshot.label,
            groups = snapshot.groups.len(),
            items = snapshot.item_count(),
            "Feed snapshot refreshed"
        );
        Ok(snapshot)
    }

    async fn is_stale(&self) -> bool {
        let state = self.state.read().await;
        state
            .refreshed_at
            .map_or(true, |at| at.elapsed() > self.staleness)
    }

    /// Refresh first if the snapshot is older than the staleness threshold
    ///
    /// Waiters that queued behind a refresh re-check staleness and skip the
    /// fetch if it already succeeded.
    async fn ensure_fresh(&self) {
        if !self.is_stale().await {
            return;
        }
        let _guard = self.refresh_lock.lock().await;
        if !self.is_stale().await {
            return;
        }
        // Failure already logged; the existing snapshot answers
        let _ = self.refresh_locked().await;
    }

    /// Latest snapshot without triggering a refresh
    pub async fn current(&self) -> Option<Arc<Snapshot>> {
        self.state.read().await.snapshot.clone()
    }

    /// Latest snapshot, refreshing lazily when stale
    pub async fn fresh(&self) -> Option<Arc<Snapshot>> {
        self.ensure_fresh().await;
        self.current().await
    }

    /// Capture time of the cached snapshot
    pub async fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.current().await.map(|s| s.captured_at)
    }

    /// Look up a course, refreshing lazily when stale
    pub async fn lookup_group(&self, key: &str) -> Option<Group> {
        self.fresh().await?.group(key).cloned()
    }

    /// Look up a section, refreshing lazily when stale
    pub async fn lookup_item(&self, group_key: &str, item_key: &str) -> Option<ResourceRecord> {
        self.fresh().await?.item(group_key, item_key).cloned()
    }

    /// Sections of `items` that the course doesn't have
    ///
    /// Returns `None` when the course itself is unknown.
    pub async fn missing_items(&self, group_key: &str, items: &[String]) -> Option<Vec<String>> {
        let snapshot = self.fresh().await?;
        let group = snapshot.group(group_key)?;
        Some(
            items
                .iter()
                .filter(|item| group.record(item).is_none())
                .cloned()
                .collect(),
        )
    }
}
