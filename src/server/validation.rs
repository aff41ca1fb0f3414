//! Startup configuration validation
//!
//! Everything here is fatal: the process refuses to start rather than run
//! with a schedule or feed it can't honour.

use super::config::AppConfig;
use anyhow::{bail, Context, Result};
use tracing::warn;

/// Validate configuration before any task starts
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.schedule.default_interval_secs == 0 {
        bail!("schedule.default_interval_secs must be greater than zero");
    }

    config
        .deadlines()
        .context("Invalid schedule.deadlines")?;

    if config.feed.url.is_none() && config.feed.path.is_none() {
        bail!("No feed source configured: set feed.url or feed.path (SEATWATCH_FEED__URL)");
    }
    if config.feed.url.is_some() && config.feed.path.is_some() {
        warn!("Both feed.url and feed.path are set, using feed.url");
    }
    if config.feed.timeout_secs == 0 {
        bail!("feed.timeout_secs must be greater than zero");
    }

    if config.delivery.queue_capacity == 0 {
        bail!("delivery.queue_capacity must be greater than zero");
    }
    if config.delivery.max_attempts == 0 {
        bail!("delivery.max_attempts must be at least 1");
    }

    if config.telegram.enabled && config.bot_token().is_none() {
        bail!(
            "Telegram is enabled but no bot token is set. \
             Set SEATWATCH_TELEGRAM__BOT_TOKEN or TELEGRAM_BOT_TOKEN, or disable [telegram]."
        );
    }

    if config.telegram.stats_flush_secs == 0 {
        bail!("telegram.stats_flush_secs must be greater than zero");
    }

    if config.telegram.private && config.telegram.admin_ids.is_empty() {
        warn!("telegram.private is set without admin_ids: nobody can use the bot");
    }

    if config.feed.accept_invalid_certs {
        warn!("SECURITY WARNING: feed TLS certificate validation is disabled");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    const VALID: &str = r#"
        [feed]
        path = "report.xls"
        [telegram]
        enabled = false
    "#;

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&parse(VALID)).is_ok());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = parse(&format!("{VALID}\n[schedule]\ndefault_interval_secs = 0"));
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_bad_deadline_rejected() {
        let config = parse(&format!(
            "{VALID}\n[schedule]\ndeadlines = [{{ at = \"2026-13-40\", label = \"x\" }}]"
        ));
        let err = validate_config(&config).unwrap_err();
        assert!(format!("{err:#}").contains("schedule.deadlines[0].at"));
    }

    #[test]
    fn test_zero_stats_flush_rejected() {
        let config = parse(
            "[feed]\npath = \"report.xls\"\n[telegram]\nenabled = false\nstats_flush_secs = 0",
        );
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_missing_feed_rejected() {
        let config = parse("[telegram]\nenabled = false");
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_telegram_token_required_when_enabled() {
        let config = parse(
            "[feed]\npath = \"report.xls\"\n[telegram]\nenabled = true\nbot_token = \"   \"",
        );
        // TELEGRAM_BOT_TOKEN may be set in the environment running the tests
        if std::env::var("TELEGRAM_BOT_TOKEN").is_err() {
            assert!(validate_config(&config).is_err());
        }
    }
}
