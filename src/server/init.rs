//! Server initialization and run loop

use super::background_tasks::{
    start_delivery_consumer, start_stats_flusher, start_tracker, LogSink,
};
use super::channel_starters::start_telegram_bot;
use super::config::AppConfig;
use super::validation::validate_config;
use anyhow::{Context, Result};
use seatwatch_channels::BotStorage;
use seatwatch_core::{
    describe_windows, wait_for_shutdown_signal, DeliveryQueue, FeedSource, NotificationSink,
    ShutdownController, SnapshotCache, SqliteSubscriptionStore, UsageStats,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Run the watcher until Ctrl+C or SIGTERM
pub async fn run(config: AppConfig) -> Result<()> {
    info!("Starting Seatwatch v{}", env!("CARGO_PKG_VERSION"));

    validate_config(&config)?;
    info!("Configuration validated");

    let data_dir = config.data_dir();
    info!("Data directory: {}", data_dir.display());

    let db_path = data_dir.join("subscriptions.db");
    let store = Arc::new(
        SqliteSubscriptionStore::from_path(&db_path)
            .await
            .context("Failed to open subscription store")?,
    );

    let source = config.feed_source().context("Failed to build feed source")?;
    info!(source = %source.describe(), format = ?config.feed.format, "Feed configured");
    let cache = Arc::new(SnapshotCache::new(
        source,
        config.feed.format.parser(),
        config.staleness(),
    ));

    // A dead feed at startup is not fatal; ticks keep retrying
    match cache.refresh().await {
        Ok(snapshot) => info!(
            label = %snapshot.label,
            courses = snapshot.groups.len(),
            sections = snapshot.item_count(),
            "Initial snapshot loaded"
        ),
        Err(e) => warn!(error = %e, "Initial feed fetch failed, retrying on the next tick"),
    }

    let shutdown_controller = ShutdownController::new();

    let ticker = config.ticker()?;
    if ticker.windows().is_empty() {
        info!(
            interval_secs = ticker.default_interval().as_secs(),
            "No deadlines configured, polling at the default interval"
        );
    } else {
        debug!("Schedule windows:\n{}", describe_windows(ticker.windows()));
    }
    let ticks = ticker.spawn(shutdown_controller.token());
    let next_tick = ticks.next_tick_watch();

    let (outbox, receiver) = DeliveryQueue::bounded(config.delivery.queue_capacity);

    let mut handles = Vec::new();
    let sink: Arc<dyn NotificationSink> = match config.telegram_config() {
        Some(telegram_config) => {
            let usage = Arc::new(UsageStats::new());
            handles.push(start_stats_flusher(
                &config,
                usage.clone(),
                store.clone(),
                &shutdown_controller,
            ));

            let (sink, handle) = start_telegram_bot(
                telegram_config,
                cache.clone(),
                BotStorage::sqlite(store.clone()),
                usage,
                next_tick,
                &shutdown_controller,
            );
            handles.push(handle);
            sink
        }
        None => {
            info!("Telegram disabled, notifications will only be logged");
            Arc::new(LogSink)
        }
    };

    handles.push(start_delivery_consumer(
        &config,
        receiver,
        sink,
        &shutdown_controller,
    ));
    handles.push(start_tracker(
        &config,
        cache,
        store,
        outbox,
        ticks,
        &shutdown_controller,
    ));

    info!("Seatwatch running, press Ctrl+C to stop");
    wait_for_shutdown_signal().await;

    if !shutdown_controller.shutdown().await {
        warn!("Some tasks did not stop in time");
    }

    let task_timeout = Duration::from_secs(5);
    for handle in handles {
        match tokio::time::timeout(task_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Background task error: {}", e),
            Err(_) => warn!("Background task shutdown timeout, aborting"),
        }
    }

    info!(phase = %shutdown_controller.phase(), "Seatwatch shutdown complete");
    Ok(())
}
