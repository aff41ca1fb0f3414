//! Background task startup functions
//!
//! Contains functions to start the tracker, the delivery consumer and the
//! usage statistics flusher.

use super::config::AppConfig;
use async_trait::async_trait;
use seatwatch_core::{
    DeliveryConsumer, DeliveryReceiver, Notification, NotificationSink, Outbox, ShutdownController,
    SnapshotCache, StatsStore, SubscriptionStore, TickStream, Tracker, UsageStats,
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Start the diff-and-notify loop driven by `ticks`
pub fn start_tracker(
    config: &AppConfig,
    cache: Arc<SnapshotCache>,
    store: Arc<dyn SubscriptionStore>,
    outbox: Outbox,
    ticks: TickStream,
    shutdown_controller: &Arc<ShutdownController>,
) -> JoinHandle<()> {
    let tracker = Tracker::new(cache, store, outbox, config.tracker.removal_policy);
    let guard = shutdown_controller.register_task("tracker");
    let token = guard.token();

    tokio::spawn(async move {
        tracker.run(ticks, token).await;
        drop(guard);
    })
}

/// Start the consumer that drains the delivery queue into `sink`
pub fn start_delivery_consumer(
    config: &AppConfig,
    receiver: DeliveryReceiver,
    sink: Arc<dyn NotificationSink>,
    shutdown_controller: &Arc<ShutdownController>,
) -> JoinHandle<()> {
    let consumer = DeliveryConsumer::new(receiver, sink, config.delivery_config());
    let guard = shutdown_controller.register_task("delivery");
    let token = guard.token();

    tokio::spawn(async move {
        let stats = consumer.run(token).await;
        info!(
            delivered = stats.delivered,
            failed = stats.failed,
            abandoned = stats.abandoned,
            "Delivery finished"
        );
        drop(guard);
    })
}

/// Start the task that persists command usage counters
pub fn start_stats_flusher(
    config: &AppConfig,
    usage: Arc<UsageStats>,
    store: Arc<dyn StatsStore>,
    shutdown_controller: &Arc<ShutdownController>,
) -> JoinHandle<()> {
    let interval = config.stats_flush_interval();
    let guard = shutdown_controller.register_task("stats");
    let token = guard.token();

    tokio::spawn(async move {
        usage.run(store, interval, token).await;
        drop(guard);
    })
}

/// Sink used when no chat transport is configured: notifications are logged
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notification: &Notification) -> seatwatch_core::Result<()> {
        info!(
            subscriber_id = notification.subscriber_id,
            group = %notification.group_key,
            item = %notification.item_key,
            text = %notification,
            "Notification (no transport)"
        );
        Ok(())
    }
}
