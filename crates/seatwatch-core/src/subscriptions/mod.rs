//! Subscriber watch lists
//!
//! A subscription is the triple `(subscriber, course, section)` plus the
//! last fullness state the tracker has seen for it. The tracker compares that
//! state with each fresh snapshot and writes it back on transitions.
//!
//! The same database also remembers per-chat conversation state: a command
//! sent without arguments leaves a pending marker so the next plain message
//! is read as its arguments.

mod store;

pub use store::SqliteSubscriptionStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::Result;

/// One watched section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    /// Chat/user identifier of the subscriber
    pub subscriber_id: i64,
    /// Course code
    pub group_key: String,
    /// Section code
    pub item_key: String,
    /// Fullness last observed by the tracker; `None` until first observed
    pub last_known_full: Option<bool>,
    /// The section disappeared from the feed and the subscriber was told
    pub orphaned: bool,
    /// When the subscription was first created
    pub created_at: DateTime<Utc>,
    /// Last subscribe or state change
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// A subscription that has not been observed yet
    pub fn new(subscriber_id: i64, group_key: impl Into<String>, item_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            subscriber_id,
            group_key: group_key.into(),
            item_key: item_key.into(),
            last_known_full: None,
            orphaned: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sort key used by the tracker: course, section, subscriber
    #[must_use]
    pub fn ordering_key(&self) -> (&str, &str, i64) {
        (&self.group_key, &self.item_key, self.subscriber_id)
    }
}

/// Durable storage for subscriptions
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Subscribe to each of `item_keys`; existing subscriptions keep their state
    async fn upsert(&self, subscriber_id: i64, group_key: &str, item_keys: &[String]) -> Result<()>;

    /// Drop every section of a course; returns the number of rows removed
    async fn remove_group(&self, subscriber_id: i64, group_key: &str) -> Result<u64>;

    /// Drop a single section; returns the number of rows removed
    async fn remove_item(&self, subscriber_id: i64, group_key: &str, item_key: &str) -> Result<u64>;

    /// Drop everything the subscriber watches
    async fn clear_all(&self, subscriber_id: i64) -> Result<u64>;

    /// Subscriptions of one subscriber, ordered by course then section
    async fn list_for_subscriber(&self, subscriber_id: i64) -> Result<Vec<Subscription>>;

    /// Every subscription, ordered by course, section, subscriber
    async fn list_all(&self) -> Result<Vec<Subscription>>;

    /// Persist `last_known_full` and `orphaned`
    ///
    /// Returns `false` when the subscription no longer exists (removed while
    /// the tracker was working on it).
    async fn update_state(&self, subscription: &Subscription) -> Result<bool>;
}

/// Per-chat pending command state
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatStateStore: Send + Sync {
    /// Remember `state` for `chat_id`, replacing any previous one
    async fn set_chat_state(&self, chat_id: i64, state: &str) -> Result<()>;

    /// Return and forget the pending state of `chat_id`
    async fn take_chat_state(&self, chat_id: i64) -> Result<Option<String>>;

    /// Forget the pending state of `chat_id`
    async fn clear_chat_state(&self, chat_id: i64) -> Result<()>;
}
