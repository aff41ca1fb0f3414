//! Channel startup functions

use chrono::{DateTime, Utc};
use seatwatch_channels::{BotStorage, TelegramBot, TelegramConfig};
use seatwatch_core::{NotificationSink, ShutdownController, SnapshotCache, UsageStats};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Start the Telegram bot; returns its notification sink and dispatcher task
pub fn start_telegram_bot(
    telegram_config: TelegramConfig,
    cache: Arc<SnapshotCache>,
    storage: BotStorage,
    usage: Arc<UsageStats>,
    next_tick: watch::Receiver<Option<DateTime<Utc>>>,
    shutdown_controller: &Arc<ShutdownController>,
) -> (Arc<dyn NotificationSink>, JoinHandle<()>) {
    let bot = Arc::new(TelegramBot::new(
        telegram_config,
        cache,
        storage,
        usage,
        next_tick,
    ));
    let sink: Arc<dyn NotificationSink> = Arc::new(bot.sink());

    let guard = shutdown_controller.register_task("telegram");
    let token = guard.token();
    let handle = tokio::spawn(async move {
        if let Err(e) = bot.run(token).await {
            error!(error = %e, "Telegram bot error");
        }
        drop(guard);
    });

    info!("Telegram bot started");
    (sink, handle)
}
