//! Enrollment feed snapshots
//!
//! A [`FeedSource`] produces raw bytes, a [`FeedParser`] turns them into
//! courses and sections, and the [`SnapshotCache`] publishes the result as an
//! immutable `Arc<Snapshot>`. Refreshes fetch and parse outside the lock and
//! only take the write lock to swap the pointer.

mod cache;
mod feed;
mod parser;
mod types;

pub use cache::SnapshotCache;
pub use feed::{FeedFormat, FeedSource, FileFeedSource, HttpFeedSource};
pub use parser::{FeedParser, JsonFeedParser, XlsFeedParser};
pub use types::{Group, ParsedFeed, ResourceRecord, Snapshot};
