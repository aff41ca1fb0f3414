//! Notification delivery over Telegram

use async_trait::async_trait;
use seatwatch_core::{Error as CoreError, Notification, NotificationSink, Result as CoreResult};
use teloxide::{
    payloads::SendMessageSetters,
    prelude::*,
    types::{ChatId, ParseMode},
    RequestError,
};
use tracing::debug;

use super::format::{notification_text, removal_keyboard};

/// [`NotificationSink`] that sends a MarkdownV2 message to the subscriber's chat
#[derive(Clone)]
pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    /// Create a sink sending through `bot`
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Sort a Telegram failure into retryable and permanent
///
/// Rate limits and network trouble may pass on retry. API errors (blocked
/// bot, unknown chat, bad markup) won't.
pub(crate) fn classify_request_error(e: RequestError) -> CoreError {
    match e {
        RequestError::Api(api) => CoreError::Rejected(api.to_string()),
        RequestError::MigrateToChatId(chat) => {
            CoreError::Rejected(format!("chat migrated to {chat}"))
        }
        other => CoreError::Delivery(other.to_string()),
    }
}

#[async_trait]
impl NotificationSink for TelegramSink {
    async fn deliver(&self, notification: &Notification) -> CoreResult<()> {
        let chat_id = ChatId(notification.subscriber_id);
        let request = self
            .bot
            .send_message(chat_id, notification_text(notification))
            .parse_mode(ParseMode::MarkdownV2);

        let result = if notification.is_removal() {
            request.reply_markup(removal_keyboard(notification)).await
        } else {
            request.await
        };

        result.map_err(classify_request_error)?;
        debug!(
            subscriber_id = notification.subscriber_id,
            group = %notification.group_key,
            item = %notification.item_key,
            "Telegram notification sent"
        );
        Ok(())
    }
}
