//! Integration tests for Seatwatch
//!
//! These drive the whole pipeline over a real feed file and SQLite database:
//! snapshot cache → tracker → delivery queue → sink.

use async_trait::async_trait;
use seatwatch_core::{
    AdaptiveTicker, DeliveryConfig, DeliveryConsumer, DeliveryQueue, DeliveryReceiver,
    FileFeedSource, JsonFeedParser, Notification, NotificationKind, NotificationSink,
    RemovalPolicy, SnapshotCache, SqliteSubscriptionStore, SubscriptionStore, Tracker,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

struct TestContext {
    _dir: TempDir,
    feed_path: PathBuf,
    cache: Arc<SnapshotCache>,
    store: Arc<SqliteSubscriptionStore>,
}

impl TestContext {
    async fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let feed_path = dir.path().join("feed.json");
        write_feed(&feed_path, &[("1L", 30, 30), ("2L", 10, 30)]);

        let cache = Arc::new(SnapshotCache::new(
            Box::new(FileFeedSource::new(&feed_path)),
            Box::new(JsonFeedParser),
            Duration::from_secs(60),
        ));
        let store = Arc::new(
            SqliteSubscriptionStore::from_path(&dir.path().join("subscriptions.db"))
                .await
                .unwrap(),
        );

        Self {
            _dir: dir,
            feed_path,
            cache,
            store,
        }
    }

    fn tracker(&self, policy: RemovalPolicy) -> (Tracker, DeliveryReceiver) {
        let (outbox, receiver) = DeliveryQueue::bounded(32);
        let tracker = Tracker::new(self.cache.clone(), self.store.clone(), outbox, policy);
        (tracker, receiver)
    }

    fn set_feed(&self, sections: &[(&str, i64, i64)]) {
        write_feed(&self.feed_path, sections);
    }
}

fn write_feed(path: &Path, sections: &[(&str, i64, i64)]) {
    let sections: Vec<String> = sections
        .iter()
        .map(|(name, enrolled, capacity)| {
            format!(r#"{{"section":"{name}","enrolled":{enrolled},"capacity":{capacity}}}"#)
        })
        .collect();
    let body = format!(
        r#"{{"label":"Spring 2026","courses":[{{"code":"PHYS 161","title":"Physics I","sections":[{}]}}]}}"#,
        sections.join(",")
    );
    std::fs::write(path, body).unwrap();
}

fn drain(receiver: &mut DeliveryReceiver) -> Vec<Notification> {
    let mut out = Vec::new();
    while let Some(notification) = receiver.try_recv() {
        out.push(notification);
    }
    out
}

#[derive(Default)]
struct RecordingSink {
    delivered: Mutex<Vec<Notification>>,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: &Notification) -> seatwatch_core::Result<()> {
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_transition_notified_exactly_once() {
    let ctx = TestContext::new().await;
    ctx.store.upsert(1, "PHYS 161", &["1L".to_string()]).await.unwrap();
    ctx.store.upsert(2, "PHYS 161", &["1L".to_string()]).await.unwrap();
    let (tracker, mut receiver) = ctx.tracker(RemovalPolicy::Flag);

    // First observation is recorded silently
    let report = tracker.check_once().await;
    assert_eq!(report.established, 2);
    assert!(drain(&mut receiver).is_empty());

    ctx.set_feed(&[("1L", 29, 30), ("2L", 10, 30)]);
    let report = tracker.check_once().await;
    assert_eq!(report.transitions, 2);

    let notifications = drain(&mut receiver);
    let recipients: Vec<i64> = notifications.iter().map(|n| n.subscriber_id).collect();
    assert_eq!(recipients, vec![1, 2]);
    assert!(notifications.iter().all(|n| n.kind
        == NotificationKind::Opened {
            size: 29,
            capacity: 30
        }));

    // Same state again: nothing new
    tracker.check_once().await;
    tracker.check_once().await;
    assert!(drain(&mut receiver).is_empty());

    // And back to full
    ctx.set_feed(&[("1L", 30, 30), ("2L", 10, 30)]);
    tracker.check_once().await;
    let notifications = drain(&mut receiver);
    assert_eq!(notifications.len(), 2);
    assert!(matches!(notifications[0].kind, NotificationKind::Filled { .. }));
}

#[tokio::test]
async fn test_state_survives_tracker_restart() {
    let ctx = TestContext::new().await;
    ctx.store.upsert(1, "PHYS 161", &["2L".to_string()]).await.unwrap();

    let (tracker, mut receiver) = ctx.tracker(RemovalPolicy::Flag);
    tracker.check_once().await;
    drop(tracker);
    assert!(drain(&mut receiver).is_empty());

    // A fresh tracker reads the persisted flag and stays quiet
    let (tracker, mut receiver) = ctx.tracker(RemovalPolicy::Flag);
    tracker.check_once().await;
    assert!(drain(&mut receiver).is_empty());

    ctx.set_feed(&[("1L", 30, 30), ("2L", 30, 30)]);
    tracker.check_once().await;
    assert_eq!(drain(&mut receiver).len(), 1);
}

#[tokio::test]
async fn test_broken_feed_keeps_retained_snapshot() {
    let ctx = TestContext::new().await;
    ctx.store.upsert(1, "PHYS 161", &["1L".to_string()]).await.unwrap();
    let (tracker, mut receiver) = ctx.tracker(RemovalPolicy::Flag);
    tracker.check_once().await;

    std::fs::write(&ctx.feed_path, b"<html>maintenance</html>").unwrap();
    let report = tracker.check_once().await;

    assert!(!report.skipped);
    assert_eq!(report.checked, 1);
    assert!(drain(&mut receiver).is_empty());
    assert_eq!(
        ctx.cache.lookup_item("PHYS 161", "1L").await.unwrap().size,
        30
    );
}

#[tokio::test]
async fn test_removed_section_flagged_once() {
    let ctx = TestContext::new().await;
    ctx.store.upsert(1, "PHYS 161", &["2L".to_string()]).await.unwrap();
    let (tracker, mut receiver) = ctx.tracker(RemovalPolicy::Flag);
    tracker.check_once().await;

    ctx.set_feed(&[("1L", 30, 30)]);
    tracker.check_once().await;
    tracker.check_once().await;

    let notifications = drain(&mut receiver);
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].kind, NotificationKind::ItemRemoved);

    let stored = ctx.store.list_for_subscriber(1).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].orphaned);
}

#[tokio::test]
async fn test_removed_section_deleted_under_delete_policy() {
    let ctx = TestContext::new().await;
    ctx.store.upsert(1, "PHYS 161", &["2L".to_string()]).await.unwrap();
    let (tracker, mut receiver) = ctx.tracker(RemovalPolicy::Delete);
    tracker.check_once().await;

    ctx.set_feed(&[("1L", 30, 30)]);
    tracker.check_once().await;

    assert_eq!(drain(&mut receiver).len(), 1);
    assert!(ctx.store.list_for_subscriber(1).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ticker_drives_pipeline_to_sink() {
    let ctx = TestContext::new().await;
    ctx.store.upsert(7, "PHYS 161", &["1L".to_string()]).await.unwrap();
    let (tracker, receiver) = ctx.tracker(RemovalPolicy::Flag);
    tracker.check_once().await;

    let token = CancellationToken::new();
    let sink = Arc::new(RecordingSink::default());
    let consumer = DeliveryConsumer::new(receiver, sink.clone(), DeliveryConfig::default());
    let consumer_task = tokio::spawn(consumer.run(token.clone()));

    let ticks = AdaptiveTicker::new(Duration::from_millis(50), Vec::new()).spawn(token.clone());
    let tracker_task = tokio::spawn(tracker.run(ticks, token.clone()));

    ctx.set_feed(&[("1L", 12, 30), ("2L", 10, 30)]);

    let delivered = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if !sink.delivered.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    assert!(delivered.is_ok(), "notification never reached the sink");

    token.cancel();
    tracker_task.await.unwrap();
    let stats = consumer_task.await.unwrap();

    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.abandoned, 0);
    let delivered = sink.delivered.lock().unwrap();
    assert_eq!(delivered[0].subscriber_id, 7);
    assert_eq!(
        delivered[0].kind,
        NotificationKind::Opened {
            size: 12,
            capacity: 30
        }
    );
}
