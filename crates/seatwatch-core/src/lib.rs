//! Seatwatch Core - Enrollment Tracking Engine
//!
//! This crate provides the polling-and-notification core of seatwatch:
//! - Schedule: adaptive tick source that tightens near registration deadlines
//! - Snapshot: immutable feed snapshots behind a stale-serving cache
//! - Subscriptions: durable per-subscriber watch list (SQLite)
//! - Tracker: per-tick diff that emits fullness transitions only
//! - Delivery: bounded outbound queue drained by a transport sink
//! - Stats: command usage counters flushed to the store in the background
//! - Shutdown: coordinated cancellation across the background tasks

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod delivery;
pub mod error;
pub mod schedule;
pub mod shutdown;
pub mod snapshot;
pub mod stats;
pub mod subscriptions;
pub mod tracker;
pub mod utils;

pub use error::{format_error_for_chat, Error, Result, UserFriendlyError};

// Re-export schedule module types
pub use schedule::{
    describe_windows, expand_deadlines, AdaptiveTicker, Deadline, ScheduleWindow, TickStream,
};

// Re-export snapshot module types
pub use snapshot::{
    FeedFormat, FeedParser, FeedSource, FileFeedSource, Group, HttpFeedSource, JsonFeedParser,
    ParsedFeed, ResourceRecord, Snapshot, SnapshotCache, XlsFeedParser,
};

// Re-export subscription store types
pub use subscriptions::{ChatStateStore, SqliteSubscriptionStore, Subscription, SubscriptionStore};

// Re-export usage statistics types
pub use stats::{StatsStore, UsageStats, DEFAULT_FLUSH_INTERVAL};

// Re-export tracker and delivery types
pub use delivery::{
    DeliveryConfig, DeliveryConsumer, DeliveryQueue, DeliveryReceiver, DeliveryStats,
    Notification, NotificationKind, NotificationSink, Outbox,
};
pub use tracker::{RemovalPolicy, TickReport, Tracker};

// Re-export shutdown module types
pub use shutdown::{wait_for_shutdown_signal, ShutdownController, ShutdownPhase, TaskGuard};

pub use utils::{retry_with_backoff, RetryConfig, RetryError};
