//! Schedule windows derived from registration deadlines

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

/// Sub-windows generated per deadline: (minutes before deadline the window
/// opens, minutes before deadline it closes, polling interval in minutes).
const STAGES: [(i64, i64, u64); 4] = [(60, 30, 30), (30, 15, 15), (15, 5, 5), (5, 0, 1)];

/// A hard external deadline (e.g. a registration priority slot opening)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadline {
    /// Instant of the deadline
    pub at: DateTime<Utc>,
    /// Human-readable label carried into the generated windows
    pub label: String,
}

impl Deadline {
    /// Create a deadline
    pub fn new(at: DateTime<Utc>, label: impl Into<String>) -> Self {
        Self {
            at,
            label: label.into(),
        }
    }

    /// Parse an RFC 3339 timestamp such as `2025-09-06T09:00:00+05:00`
    pub fn parse(at: &str, label: impl Into<String>) -> Result<Self> {
        let parsed = DateTime::parse_from_rfc3339(at.trim()).map_err(|e| {
            Error::invalid_config("schedule.deadlines.at", format!("'{}': {}", at, e))
        })?;
        Ok(Self::new(parsed.with_timezone(&Utc), label))
    }
}

/// A time range `[from, till)` with its own polling interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleWindow {
    /// Inclusive start
    pub from: DateTime<Utc>,
    /// Exclusive end
    pub till: DateTime<Utc>,
    /// Polling interval while inside the window
    pub interval: Duration,
    /// Label of the deadline this window belongs to
    pub label: String,
}

impl ScheduleWindow {
    /// Whether `at` falls inside `[from, till)`
    #[must_use]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from <= at && at < self.till
    }
}

/// Expand each deadline into four consecutive windows with shrinking interval
///
/// Output preserves input order: all windows of the first deadline, then the
/// second, and so on. Deadlines closer than an hour apart produce overlapping
/// windows; overlap is resolved at evaluation time, not here.
pub fn expand_deadlines(deadlines: &[Deadline]) -> Vec<ScheduleWindow> {
    let mut windows = Vec::with_capacity(deadlines.len() * STAGES.len());
    for deadline in deadlines {
        for (opens, closes, interval) in STAGES {
            windows.push(ScheduleWindow {
                from: deadline.at - ChronoDuration::minutes(opens),
                till: deadline.at - ChronoDuration::minutes(closes),
                interval: Duration::from_secs(interval * 60),
                label: deadline.label.clone(),
            });
        }
    }
    windows
}

/// Render windows one per line, for the `windows` CLI command and logs
pub fn describe_windows(windows: &[ScheduleWindow]) -> String {
    windows
        .iter()
        .map(|w| {
            format!(
                "{} .. {}  every {:>3}s  {}",
                w.from.to_rfc3339(),
                w.till.to_rfc3339(),
                w.interval.as_secs(),
                w.label
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
