//! Telegram configuration types

use crate::error::{Error, Result};

/// Telegram bot configuration
#[derive(Debug, Clone, Default)]
pub struct TelegramConfig {
    /// Bot token
    pub bot_token: String,
    /// Only admins may talk to the bot
    pub private: bool,
    /// Admin user IDs (access in private mode, `/status`)
    pub admin_ids: Vec<i64>,
}

impl TelegramConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            ..Self::default()
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| Error::Telegram("TELEGRAM_BOT_TOKEN not set".to_string()))?;

        let admin_ids: Vec<i64> = std::env::var("TELEGRAM_ADMIN_IDS")
            .ok()
            .map(|s| {
                s.split(',')
                    .filter_map(|id| id.trim().parse().ok())
                    .collect()
            })
            .unwrap_or_default();

        let private = std::env::var("TELEGRAM_PRIVATE")
            .map(|s| s == "true" || s == "1")
            .unwrap_or(false);

        Ok(Self {
            bot_token,
            private,
            admin_ids,
        })
    }

    /// Restrict the bot to admins
    #[must_use]
    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    /// Set admin user IDs
    #[must_use]
    pub fn with_admin_ids(mut self, ids: Vec<i64>) -> Self {
        self.admin_ids = ids;
        self
    }

    /// Whether the user is an admin
    #[must_use]
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }

    /// Whether the user may use the bot at all
    #[must_use]
    pub fn is_user_allowed(&self, user_id: i64) -> bool {
        !self.private || self.is_admin(user_id)
    }
}
