//! Outbound notification queue
//!
//! The tracker produces [`Notification`]s into an [`Outbox`]; a single
//! [`DeliveryConsumer`] drains them into a [`NotificationSink`] (the chat
//! transport). The queue is bounded and `enqueue` waits for space: state
//! transitions are never dropped to relieve backpressure.
//!
//! ## Shutdown
//!
//! On cancellation the consumer stops waiting for new work but keeps
//! delivering what is already queued until every producer is gone and the
//! queue is empty, or until the drain timeout elapses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::utils::{retry_with_backoff, RetryConfig};

/// What happened to a watched section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationKind {
    /// A full section has free seats again
    Opened {
        /// Enrolled
        size: i64,
        /// Capacity
        capacity: i64,
    },
    /// A section with free seats is now full
    Filled {
        /// Enrolled
        size: i64,
        /// Capacity
        capacity: i64,
    },
    /// The whole course disappeared from the feed
    GroupRemoved,
    /// The section disappeared from the course
    ItemRemoved,
}

/// A message for one subscriber about one section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Recipient
    pub subscriber_id: i64,
    /// Course code
    pub group_key: String,
    /// Section code
    pub item_key: String,
    /// What changed
    pub kind: NotificationKind,
}

impl Notification {
    /// Create a notification
    pub fn new(
        subscriber_id: i64,
        group_key: impl Into<String>,
        item_key: impl Into<String>,
        kind: NotificationKind,
    ) -> Self {
        Self {
            subscriber_id,
            group_key: group_key.into(),
            item_key: item_key.into(),
            kind,
        }
    }

    /// Whether this tells about a course or section that no longer exists
    #[must_use]
    pub fn is_removal(&self) -> bool {
        matches!(
            self.kind,
            NotificationKind::GroupRemoved | NotificationKind::ItemRemoved
        )
    }
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NotificationKind::Opened { size, capacity } => write!(
                f,
                "🔆 {} {} now has free places ({}/{})",
                self.group_key, self.item_key, size, capacity
            ),
            NotificationKind::Filled { size, capacity } => write!(
                f,
                "🚫 {} {} is full ({}/{})",
                self.group_key, self.item_key, size, capacity
            ),
            NotificationKind::GroupRemoved => write!(
                f,
                "⚠️ {} is no longer offered, so {} {} can't be tracked",
                self.group_key, self.group_key, self.item_key
            ),
            NotificationKind::ItemRemoved => write!(
                f,
                "⚠️ {} {} is not in the schedule anymore",
                self.group_key, self.item_key
            ),
        }
    }
}

/// Transport that puts a notification in front of the subscriber
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver one notification
    ///
    /// Transient failures ([`Error::is_transient`]) are retried by the
    /// consumer; anything else drops the notification.
    async fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Delivery queue settings
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Queue slots
    pub queue_capacity: usize,
    /// How long to keep draining after cancellation
    pub drain_timeout: Duration,
    /// Retry policy for transient transport failures
    pub retry: RetryConfig,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            drain_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
        }
    }
}

/// Constructor for the queue halves
pub struct DeliveryQueue;

impl DeliveryQueue {
    /// Create a bounded queue with `capacity` slots (at least one)
    #[must_use]
    pub fn bounded(capacity: usize) -> (Outbox, DeliveryReceiver) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Outbox { tx }, DeliveryReceiver { rx })
    }
}

/// Producer half of the delivery queue
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::Sender<Notification>,
}

impl Outbox {
    /// Queue a notification, waiting while the queue is full
    pub async fn enqueue(&self, notification: Notification) -> Result<()> {
        self.tx
            .send(notification)
            .await
            .map_err(|_| Error::QueueClosed)
    }
}

/// Consumer half of the delivery queue
pub struct DeliveryReceiver {
    rx: mpsc::Receiver<Notification>,
}

impl DeliveryReceiver {
    /// Wait for the next notification; `None` once every producer is gone
    pub async fn recv(&mut self) -> Option<Notification> {
        self.rx.recv().await
    }

    /// Take a queued notification without waiting
    pub fn try_recv(&mut self) -> Option<Notification> {
        self.rx.try_recv().ok()
    }
}

/// Counters reported when the consumer exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    /// Delivered successfully
    pub delivered: u64,
    /// Gave up after retries or on a permanent error
    pub failed: u64,
    /// Still queued when the drain timeout elapsed
    pub abandoned: u64,
}

/// Drains the queue into a sink
pub struct DeliveryConsumer {
    receiver: DeliveryReceiver,
    sink: Arc<dyn NotificationSink>,
    config: DeliveryConfig,
    stats: DeliveryStats,
}

impl DeliveryConsumer {
    /// Create a consumer
    pub fn new(
        receiver: DeliveryReceiver,
        sink: Arc<dyn NotificationSink>,
        config: DeliveryConfig,
    ) -> Self {
        Self {
            receiver,
            sink,
            config,
            stats: DeliveryStats::default(),
        }
    }

    /// Deliver until cancelled (then drain) or until every producer is gone
    pub async fn run(mut self, token: CancellationToken) -> DeliveryStats {
        info!("Delivery consumer started");

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                next = self.receiver.rx.recv() => match next {
                    Some(notification) => self.deliver(notification).await,
                    None => {
                        info!(delivered = self.stats.delivered, "All producers gone, delivery consumer stopped");
                        return self.stats;
                    }
                },
            }
        }

        let drain_timeout = self.config.drain_timeout;
        debug!(timeout_secs = drain_timeout.as_secs(), "Draining delivery queue");
        if tokio::time::timeout(drain_timeout, self.drain()).await.is_err() {
            self.receiver.rx.close();
            while self.receiver.rx.try_recv().is_ok() {
                self.stats.abandoned += 1;
            }
            warn!(
                abandoned = self.stats.abandoned,
                "Drain timeout elapsed, dropping queued notifications"
            );
        }

        info!(
            delivered = self.stats.delivered,
            failed = self.stats.failed,
            abandoned = self.stats.abandoned,
            "Delivery consumer stopped"
        );
        self.stats
    }

    async fn drain(&mut self) {
        while let Some(notification) = self.receiver.rx.recv().await {
            self.deliver(notification).await;
        }
    }

    async fn deliver(&mut self, notification: Notification) {
        let sink = &self.sink;
        let note = &notification;
        let result = retry_with_backoff(
            &self.config.retry,
            || sink.deliver(note),
            Error::is_transient,
        )
        .await;

        match result {
            Ok(()) => {
                self.stats.delivered += 1;
                debug!(
                    subscriber_id = notification.subscriber_id,
                    group = %notification.group_key,
                    item = %notification.item_key,
                    "Notification delivered"
                );
            }
            Err(e) => {
                self.stats.failed += 1;
                error!(
                    subscriber_id = notification.subscriber_id,
                    group = %notification.group_key,
                    item = %notification.item_key,
                    attempts = e.attempts,
                    error = %e.last_error,
                    "Dropping notification"
                );
            }
        }
    }
}
