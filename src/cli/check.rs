//! `seatwatch check`

use crate::server::AppConfig;
use anyhow::{Context, Result};
use seatwatch_core::{FeedSource, SnapshotCache};

/// Fetch and parse the feed once, then print what it contains
pub async fn run(config: &AppConfig) -> Result<()> {
    let source = config.feed_source().context("Invalid feed configuration")?;
    println!("Fetching {}", source.describe());

    let cache = SnapshotCache::new(source, config.feed.format.parser(), config.staleness());
    let snapshot = cache.refresh().await.context("Feed check failed")?;

    let full = snapshot
        .groups
        .values()
        .flat_map(|g| g.records.iter())
        .filter(|r| r.is_full())
        .count();

    println!("Term:      {}", snapshot.label);
    println!("Courses:   {}", snapshot.groups.len());
    println!("Sections:  {} ({} full)", snapshot.item_count(), full);
    println!("Prefixes:  {}", snapshot.item_prefixes.join(", "));
    Ok(())
}
