//! Snapshot data types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Enrollment numbers of one section of one course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Course code, e.g. `PHYS 161`
    pub group_key: String,
    /// Section code, e.g. `1L`
    pub item_key: String,
    /// Currently enrolled
    pub size: i64,
    /// Maximum enrollment
    pub capacity: i64,
}

impl ResourceRecord {
    /// Create a record
    pub fn new(
        group_key: impl Into<String>,
        item_key: impl Into<String>,
        size: i64,
        capacity: i64,
    ) -> Self {
        Self {
            group_key: group_key.into(),
            item_key: item_key.into(),
            size,
            capacity,
        }
    }

    /// A section is full when enrollment reached capacity
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.size >= self.capacity
    }
}

/// All sections of one course
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Course code
    pub key: String,
    /// Full course title
    pub title: String,
    /// Sections in feed order
    pub records: Vec<ResourceRecord>,
}

impl Group {
    /// Find a section by its exact code
    #[must_use]
    pub fn record(&self, item_key: &str) -> Option<&ResourceRecord> {
        self.records.iter().find(|r| r.item_key == item_key)
    }
}

/// Output of a [`FeedParser`](super::FeedParser) before it is stamped into a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFeed {
    /// Term label, e.g. `Fall 2025`
    pub label: String,
    /// Courses keyed by code
    pub groups: HashMap<String, Group>,
    /// Distinct section kinds (`L`, `R`, `Lb`, ...), sorted
    pub item_prefixes: Vec<String>,
}

/// One immutable view of the feed
///
/// Published as `Arc<Snapshot>` and replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Term label
    pub label: String,
    /// When the feed was fetched
    pub captured_at: DateTime<Utc>,
    /// Courses keyed by code
    pub groups: HashMap<String, Group>,
    /// Distinct section kinds
    pub item_prefixes: Vec<String>,
}

impl Snapshot {
    /// Stamp a parsed feed with its capture time
    pub fn from_parsed(parsed: ParsedFeed, captured_at: DateTime<Utc>) -> Self {
        Self {
            label: parsed.label,
            captured_at,
            groups: parsed.groups,
            item_prefixes: parsed.item_prefixes,
        }
    }

    /// Look up a course
    #[must_use]
    pub fn group(&self, key: &str) -> Option<&Group> {
        self.groups.get(key)
    }

    /// Look up a section of a course
    #[must_use]
    pub fn item(&self, group_key: &str, item_key: &str) -> Option<&ResourceRecord> {
        self.groups.get(group_key)?.record(item_key)
    }

    /// Total number of sections across all courses
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.groups.values().map(|g| g.records.len()).sum()
    }
}

/// Strip the leading section number: `1L` -> `L`, `12 - Lb` -> `Lb`
pub(crate) fn item_prefix(item_key: &str) -> &str {
    item_key.trim_start_matches(|c: char| c.is_ascii_digit() || c == ' ' || c == '-')
}
