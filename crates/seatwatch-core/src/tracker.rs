//! Per-tick diff between the feed and stored subscriptions
//!
//! Each tick compares every subscription's last known fullness with the
//! current snapshot and emits a notification only when it changed. The new
//! state is persisted before the notification is queued, so a crash between
//! the two loses at most one message instead of repeating it forever.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::delivery::{Notification, NotificationKind, Outbox};
use crate::error::Result;
use crate::schedule::TickStream;
use crate::snapshot::{Snapshot, SnapshotCache};
use crate::subscriptions::{Subscription, SubscriptionStore};

/// What to do with a subscription whose course or section left the feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalPolicy {
    /// Notify once and keep the row marked as orphaned; the subscriber
    /// decides (the transport offers unsubscribe/ignore)
    #[default]
    Flag,
    /// Notify once and delete the row
    Delete,
}

/// Summary of one tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Subscriptions examined
    pub checked: usize,
    /// Opened/filled notifications queued
    pub transitions: usize,
    /// Removal notifications queued
    pub removals: usize,
    /// Subscriptions whose state was recorded for the first time
    pub established: usize,
    /// Subscriptions (or the listing itself) that failed
    pub errors: usize,
    /// No snapshot has ever loaded; nothing was checked
    pub skipped: bool,
}

enum Outcome {
    Unchanged,
    Established,
    Transition,
    Removed,
}

/// Diff-and-notify engine
pub struct Tracker {
    cache: Arc<SnapshotCache>,
    store: Arc<dyn SubscriptionStore>,
    outbox: Outbox,
    policy: RemovalPolicy,
}

impl Tracker {
    /// Create a tracker
    pub fn new(
        cache: Arc<SnapshotCache>,
        store: Arc<dyn SubscriptionStore>,
        outbox: Outbox,
        policy: RemovalPolicy,
    ) -> Self {
        Self {
            cache,
            store,
            outbox,
            policy,
        }
    }

    /// Run one tick: refresh, diff, persist, notify
    pub async fn check_once(&self) -> TickReport {
        let mut report = TickReport::default();

        if self.cache.refresh().await.is_err() {
            debug!("Continuing with the retained snapshot");
        }
        let Some(snapshot) = self.cache.current().await else {
            warn!("No snapshot has been loaded yet, skipping tick");
            report.skipped = true;
            return report;
        };

        let mut subscriptions = match self.store.list_all().await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                error!(error = %e, "Failed to list subscriptions");
                report.errors += 1;
                return report;
            }
        };
        subscriptions.sort_by(|a, b| a.ordering_key().cmp(&b.ordering_key()));

        for subscription in subscriptions {
            report.checked += 1;
            let subscriber_id = subscription.subscriber_id;
            let group = subscription.group_key.clone();
            let item = subscription.item_key.clone();

            match self.check_subscription(&snapshot, subscription).await {
                Ok(Outcome::Unchanged) => {}
                Ok(Outcome::Established) => report.established += 1,
                Ok(Outcome::Transition) => report.transitions += 1,
                Ok(Outcome::Removed) => report.removals += 1,
                Err(e) => {
                    report.errors += 1;
                    warn!(
                        subscriber_id,
                        group = %group,
                        item = %item,
                        error = %e,
                        "Failed to check subscription"
                    );
                }
            }
        }

        report
    }

    async fn check_subscription(
        &self,
        snapshot: &Snapshot,
        mut subscription: Subscription,
    ) -> Result<Outcome> {
        let Some(group) = snapshot.group(&subscription.group_key) else {
            return self
                .handle_removal(subscription, NotificationKind::GroupRemoved)
                .await;
        };
        let Some(record) = group.record(&subscription.item_key) else {
            return self
                .handle_removal(subscription, NotificationKind::ItemRemoved)
                .await;
        };
        let full = record.is_full();

        if subscription.orphaned {
            subscription.orphaned = false;
            subscription.last_known_full = Some(full);
            self.store.update_state(&subscription).await?;
            info!(
                subscriber_id = subscription.subscriber_id,
                group = %subscription.group_key,
                item = %subscription.item_key,
                "Section is back in the feed"
            );
            return Ok(Outcome::Established);
        }

        match subscription.last_known_full {
            None => {
                subscription.last_known_full = Some(full);
                self.store.update_state(&subscription).await?;
                Ok(Outcome::Established)
            }
            Some(previous) if previous == full => Ok(Outcome::Unchanged),
            Some(_) => {
                subscription.last_known_full = Some(full);
                if !self.store.update_state(&subscription).await? {
                    debug!(
                        subscriber_id = subscription.subscriber_id,
                        group = %subscription.group_key,
                        item = %subscription.item_key,
                        "Subscription removed mid-tick, not notifying"
                    );
                    return Ok(Outcome::Unchanged);
                }

                let (size, capacity) = (record.size, record.capacity);
                let kind = if full {
                    NotificationKind::Filled { size, capacity }
                } else {
                    NotificationKind::Opened { size, capacity }
                };
                self.notify(&subscription, kind).await?;
                Ok(Outcome::Transition)
            }
        }
    }

    async fn handle_removal(
        &self,
        mut subscription: Subscription,
        kind: NotificationKind,
    ) -> Result<Outcome> {
        if subscription.orphaned {
            return Ok(Outcome::Unchanged);
        }

        let persisted = match self.policy {
            RemovalPolicy::Flag => {
                subscription.orphaned = true;
                self.store.update_state(&subscription).await?
            }
            RemovalPolicy::Delete => {
                self.store
                    .remove_item(
                        subscription.subscriber_id,
                        &subscription.group_key,
                        &subscription.item_key,
                    )
                    .await?
                    > 0
            }
        };
        if !persisted {
            return Ok(Outcome::Unchanged);
        }

        self.notify(&subscription, kind).await?;
        Ok(Outcome::Removed)
    }

    async fn notify(&self, subscription: &Subscription, kind: NotificationKind) -> Result<()> {
        let notification = Notification::new(
            subscription.subscriber_id,
            subscription.group_key.clone(),
            subscription.item_key.clone(),
            kind,
        );
        debug!(
            subscriber_id = notification.subscriber_id,
            group = %notification.group_key,
            item = %notification.item_key,
            kind = ?notification.kind,
            "Queueing notification"
        );
        self.outbox.enqueue(notification).await
    }

    /// Check on every tick until cancelled or the tick stream ends
    ///
    /// A pass that has started always finishes before cancellation is
    /// observed. The outbox is dropped on return, which lets the delivery
    /// consumer finish draining.
    pub async fn run(self, mut ticks: TickStream, token: CancellationToken) {
        info!(policy = ?self.policy, "Tracker started");

        loop {
            let tick = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                tick = ticks.recv() => tick,
            };
            let Some(at) = tick else {
                break;
            };

            let report = self.check_once().await;
            info!(
                tick_at = %at,
                checked = report.checked,
                transitions = report.transitions,
                removals = report.removals,
                established = report.established,
                errors = report.errors,
                skipped = report.skipped,
                "Tick processed"
            );
        }

        info!("Tracker stopped");
    }
}
