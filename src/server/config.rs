//! Configuration structures for the server

use seatwatch_channels::TelegramConfig;
use seatwatch_core::{
    AdaptiveTicker, Deadline, DeliveryConfig, FeedFormat, FeedSource, FileFeedSource,
    HttpFeedSource, RemovalPolicy, RetryConfig,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data_dir: Option<String>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub delivery: DeliveryAppConfig,
    #[serde(default)]
    pub telegram: TelegramAppConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// Where the enrollment report comes from
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub format: FeedFormat,
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_feed_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_staleness")]
    pub staleness_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            url: None,
            path: None,
            format: FeedFormat::default(),
            accept_invalid_certs: false,
            timeout_secs: default_feed_timeout(),
            staleness_secs: default_staleness(),
        }
    }
}

fn default_feed_timeout() -> u64 {
    30
}

fn default_staleness() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeadlineConfig {
    /// RFC 3339 timestamp
    pub at: String,
    #[serde(default)]
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval")]
    pub default_interval_secs: u64,
    #[serde(default)]
    pub deadlines: Vec<DeadlineConfig>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: default_interval(),
            deadlines: Vec::new(),
        }
    }
}

fn default_interval() -> u64 {
    1800
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub removal_policy: RemovalPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryAppConfig {
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for DeliveryAppConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            drain_timeout_secs: default_drain_timeout(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

fn default_queue_capacity() -> usize {
    256
}

fn default_drain_timeout() -> u64 {
    10
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramAppConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub admin_ids: Vec<i64>,
    #[serde(default = "default_stats_flush")]
    pub stats_flush_secs: u64,
}

impl Default for TelegramAppConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_token: None,
            private: false,
            admin_ids: Vec::new(),
            stats_flush_secs: default_stats_flush(),
        }
    }
}

fn default_stats_flush() -> u64 {
    seatwatch_core::DEFAULT_FLUSH_INTERVAL.as_secs()
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Data directory, `data` when unset
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    /// Parsed deadlines
    pub fn deadlines(&self) -> seatwatch_core::Result<Vec<Deadline>> {
        self.schedule
            .deadlines
            .iter()
            .enumerate()
            .map(|(i, d)| {
                Deadline::parse(&d.at, d.label.clone()).map_err(|_| {
                    seatwatch_core::Error::invalid_config(
                        format!("schedule.deadlines[{}].at", i),
                        format!("'{}' is not an RFC 3339 timestamp", d.at),
                    )
                })
            })
            .collect()
    }

    pub fn ticker(&self) -> seatwatch_core::Result<AdaptiveTicker> {
        let default_interval = Duration::from_secs(self.schedule.default_interval_secs);
        Ok(AdaptiveTicker::from_deadlines(default_interval, &self.deadlines()?))
    }

    /// Feed source; the URL wins when both are set
    pub fn feed_source(&self) -> seatwatch_core::Result<Box<dyn FeedSource>> {
        match (&self.feed.url, &self.feed.path) {
            (Some(url), _) => Ok(Box::new(HttpFeedSource::new(
                url.clone(),
                self.feed.accept_invalid_certs,
                Duration::from_secs(self.feed.timeout_secs),
            )?)),
            (None, Some(path)) => Ok(Box::new(FileFeedSource::new(path))),
            (None, None) => Err(seatwatch_core::Error::invalid_config(
                "feed",
                "set feed.url or feed.path",
            )),
        }
    }

    pub fn staleness(&self) -> Duration {
        Duration::from_secs(self.feed.staleness_secs)
    }

    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            queue_capacity: self.delivery.queue_capacity,
            drain_timeout: Duration::from_secs(self.delivery.drain_timeout_secs),
            retry: RetryConfig::new()
                .with_max_attempts(self.delivery.max_attempts)
                .with_initial_delay(Duration::from_millis(self.delivery.retry_delay_ms)),
        }
    }

    /// Bot token from config, falling back to `TELEGRAM_BOT_TOKEN`
    pub fn bot_token(&self) -> Option<String> {
        self.telegram
            .bot_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .or_else(|| std::env::var("TELEGRAM_BOT_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }

    /// How often usage counters are persisted
    pub fn stats_flush_interval(&self) -> Duration {
        Duration::from_secs(self.telegram.stats_flush_secs)
    }

    /// Telegram settings, `None` when disabled or without a token
    pub fn telegram_config(&self) -> Option<TelegramConfig> {
        if !self.telegram.enabled {
            return None;
        }
        let token = self.bot_token()?;
        Some(
            TelegramConfig::new(token)
                .with_private(self.telegram.private)
                .with_admin_ids(self.telegram.admin_ids.clone()),
        )
    }
}
