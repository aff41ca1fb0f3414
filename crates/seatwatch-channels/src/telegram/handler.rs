//! Telegram message handler and bot runner

use super::commands::{
    normalize_section, parse_import, CallbackAction, Command, ImportLine, PendingCommand,
};
use super::config::TelegramConfig;
use super::format;
use super::sink::TelegramSink;
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use seatwatch_core::{
    format_error_for_chat, ChatStateStore, SnapshotCache, SqliteSubscriptionStore, StatsStore,
    SubscriptionStore, UsageStats,
};
use std::sync::Arc;
use std::time::Duration;
use teloxide::{
    net::Download,
    payloads::{AnswerCallbackQuerySetters, SendMessageSetters},
    prelude::*,
    types::{BotCommand, Document, Message as TelegramMessage, ParseMode},
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const PRIVATE_TEXT: &str = "🔒 This bot is private.";
const NOT_LOADED_TEXT: &str = "⏳ The course schedule isn't loaded yet. Please try again in a minute.";
const IMPORT_HINT: &str = "To import a schedule file, send /subscribe first and then the file.";
const MAX_IMPORT_BYTES: u64 = 64 * 1024;

/// Counter bumped for every message the bot answers
pub(crate) const REQUESTS_KEY: &str = "requests";

/// Storage the bot reads and writes
#[derive(Clone)]
pub struct BotStorage {
    /// Watch lists
    pub subscriptions: Arc<dyn SubscriptionStore>,
    /// Pending two-step commands
    pub chat_states: Arc<dyn ChatStateStore>,
    /// Persisted usage totals
    pub stats: Arc<dyn StatsStore>,
}

impl BotStorage {
    /// All three backed by one SQLite database
    #[must_use]
    pub fn sqlite(store: Arc<SqliteSubscriptionStore>) -> Self {
        Self {
            subscriptions: store.clone(),
            chat_states: store.clone(),
            stats: store,
        }
    }
}

/// Subscription bot: answers commands and course lookups
pub struct TelegramBot {
    pub(crate) bot: Bot,
    pub(crate) config: TelegramConfig,
    cache: Arc<SnapshotCache>,
    store: Arc<dyn SubscriptionStore>,
    chat_states: Arc<dyn ChatStateStore>,
    stats_store: Arc<dyn StatsStore>,
    usage: Arc<UsageStats>,
    next_tick: watch::Receiver<Option<DateTime<Utc>>>,
}

impl TelegramBot {
    /// Create a bot; `usage` is shared with the task that persists it
    #[must_use]
    pub fn new(
        config: TelegramConfig,
        cache: Arc<SnapshotCache>,
        storage: BotStorage,
        usage: Arc<UsageStats>,
        next_tick: watch::Receiver<Option<DateTime<Utc>>>,
    ) -> Self {
        let bot = Bot::new(&config.bot_token);
        Self {
            bot,
            config,
            cache,
            store: storage.subscriptions,
            chat_states: storage.chat_states,
            stats_store: storage.stats,
            usage,
            next_tick,
        }
    }

    /// Notification sink sharing this bot's client
    #[must_use]
    pub fn sink(&self) -> TelegramSink {
        TelegramSink::new(self.bot.clone())
    }

    /// Serve updates until `token` is cancelled
    #[instrument(skip(self, token))]
    pub async fn run(self: Arc<Self>, token: CancellationToken) -> Result<()> {
        info!(private = self.config.private, "Starting Telegram bot");

        if let Err(e) = self.bot.set_my_commands(bot_commands()).await {
            warn!(error = %e, "Failed to register bot commands");
        }

        let on_message = self.clone();
        let on_callback = self.clone();
        let handler = dptree::entry()
            .branch(Update::filter_message().endpoint(
                move |bot: Bot, msg: TelegramMessage| {
                    let this = on_message.clone();
                    async move { this.handle_message(bot, msg).await }
                },
            ))
            .branch(Update::filter_callback_query().endpoint(
                move |bot: Bot, q: CallbackQuery| {
                    let this = on_callback.clone();
                    async move { this.handle_callback(bot, q).await }
                },
            ));

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler).build();

        // shutdown() errs while the dispatcher is still starting up
        let shutdown = dispatcher.shutdown_token();
        let stopper = tokio::spawn(async move {
            token.cancelled().await;
            loop {
                match shutdown.shutdown() {
                    Ok(done) => {
                        done.await;
                        break;
                    }
                    Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
                }
            }
        });

        dispatcher.dispatch().await;
        stopper.abort();

        info!("Telegram bot stopped");
        Ok(())
    }

    /// Handle an incoming message
    pub(crate) async fn handle_message(
        self: Arc<Self>,
        bot: Bot,
        msg: TelegramMessage,
    ) -> ResponseResult<()> {
        let Some(user) = msg.from.as_ref() else {
            return Ok(());
        };
        let user_id = user.id.0 as i64;
        let chat_id = msg.chat.id.0;

        let reply = if !self.config.is_user_allowed(user_id) {
            info!(user_id, "Rejected message in private mode");
            format::plain(PRIVATE_TEXT)
        } else if let Some(document) = msg.document() {
            debug!(chat_id, user_id, "Received document");
            self.reply_to_document(&bot, chat_id, document, msg.caption())
                .await
        } else if let Some(text) = msg.text() {
            debug!(chat_id, user_id, "Received message");
            self.reply_to_text(chat_id, user_id, text).await
        } else {
            return Ok(());
        };

        bot.send_message(msg.chat.id, reply)
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
        Ok(())
    }

    /// Handle an inline keyboard press
    pub(crate) async fn handle_callback(self: Arc<Self>, bot: Bot, q: CallbackQuery) -> ResponseResult<()> {
        let user_id = q.from.id.0 as i64;
        let action = q.data.as_deref().and_then(CallbackAction::parse);

        let (Some(action), Some(message)) = (action, q.message.as_ref()) else {
            bot.answer_callback_query(q.id.clone()).await?;
            return Ok(());
        };
        if !self.config.is_user_allowed(user_id) {
            bot.answer_callback_query(q.id.clone())
                .text(PRIVATE_TEXT)
                .await?;
            return Ok(());
        }

        let chat_id = message.chat().id;
        let answer = match &action {
            CallbackAction::Unsubscribe { course, section } => {
                match self.unsubscribe(chat_id.0, course, section.as_deref()).await {
                    Ok(_) => "Unsubscribed".to_string(),
                    Err(e) => {
                        warn!(chat_id = %chat_id, error = %e, "Callback unsubscribe failed");
                        "Something went wrong, try /unsubscribe".to_string()
                    }
                }
            }
            CallbackAction::Ignore => "Ignored".to_string(),
        };

        bot.answer_callback_query(q.id.clone()).text(answer).await?;
        if let Err(e) = bot.delete_message(chat_id, message.id()).await {
            debug!(chat_id = %chat_id, error = %e, "Could not delete message");
        }
        Ok(())
    }

    /// MarkdownV2 reply for a text message; errors become readable replies
    ///
    /// A slash command drops any pending state. Plain text completes a
    /// pending `/subscribe` or `/unsubscribe`, or else is a course lookup.
    pub(crate) async fn reply_to_text(&self, chat_id: i64, user_id: i64, text: &str) -> String {
        self.usage.record(REQUESTS_KEY).await;

        let text = text.trim();
        let parsed = if text.starts_with('/') {
            if let Err(e) = self.chat_states.clear_chat_state(chat_id).await {
                warn!(chat_id, error = %e, "Failed to reset chat state");
            }
            Command::parse(text)
        } else {
            match self.take_pending(chat_id).await {
                Some(pending) => pending.parse_args(text),
                None => Command::parse(text),
            }
        };

        let result = match parsed {
            Ok(command) => {
                self.usage.record(command.usage_key()).await;
                self.reply_for(chat_id, user_id, command).await
            }
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| error_reply(chat_id, &e))
    }

    /// MarkdownV2 reply for an uploaded file: a schedule import when the
    /// chat asked for `/subscribe` (pending or as the caption)
    async fn reply_to_document(
        &self,
        bot: &Bot,
        chat_id: i64,
        document: &Document,
        caption: Option<&str>,
    ) -> String {
        self.usage.record(REQUESTS_KEY).await;

        let pending = self.take_pending(chat_id).await;
        let captioned = caption.is_some_and(|c| c.trim_start().starts_with("/subscribe"));
        if pending != Some(PendingCommand::Subscribe) && !captioned {
            return format::plain(IMPORT_HINT);
        }
        if document.file.size as u64 > MAX_IMPORT_BYTES {
            return format::plain("❌ The file is too large for a schedule.");
        }

        self.usage.record("command/import").await;
        match download_text(bot, document).await {
            Ok(text) => self.import_subscriptions(chat_id, &text).await,
            Err(e) => {
                warn!(chat_id, error = %e, "Schedule download failed");
                error_reply(chat_id, &e)
            }
        }
    }

    /// Subscribe to every course line of a schedule file
    pub(crate) async fn import_subscriptions(&self, chat_id: i64, text: &str) -> String {
        let mut lines = Vec::new();
        for line in parse_import(text) {
            let reply = match line {
                ImportLine::Subscribe { course, sections } => self
                    .subscribe(chat_id, &course, &sections)
                    .await
                    .unwrap_or_else(|e| error_reply(chat_id, &e)),
                ImportLine::Invalid(line) => format::invalid_import_line(&line),
            };
            lines.push(reply);
        }
        info!(chat_id, lines = lines.len(), "Schedule imported");
        format::import_report(&lines)
    }

    async fn take_pending(&self, chat_id: i64) -> Option<PendingCommand> {
        match self.chat_states.take_chat_state(chat_id).await {
            Ok(state) => state.as_deref().and_then(PendingCommand::from_state),
            Err(e) => {
                warn!(chat_id, error = %e, "Failed to read chat state");
                None
            }
        }
    }

    async fn reply_for(&self, chat_id: i64, user_id: i64, command: Command) -> Result<String> {
        let reply = match command {
            Command::Start => format::plain(format::WELCOME_TEXT),
            Command::Help => format::plain(format::HELP_TEXT),
            Command::Subscribe { course, sections } => {
                self.subscribe(chat_id, &course, &sections).await?
            }
            Command::Unsubscribe { course, section } => {
                let removed = self.unsubscribe(chat_id, &course, section.as_deref()).await?;
                format::unsubscribed(&course, section.as_deref(), removed)
            }
            Command::List => {
                let subscriptions = self.store.list_for_subscriber(chat_id).await?;
                format::subscription_list(&subscriptions)
            }
            Command::Clear => {
                let removed = self.store.clear_all(chat_id).await?;
                info!(chat_id, removed, "Subscriptions cleared");
                format::cleared(removed)
            }
            Command::Next => {
                let next = *self.next_tick.borrow();
                format::next_check(next, Utc::now())
            }
            Command::Status | Command::Stats if !self.config.is_admin(user_id) => {
                format::plain("This command is for admins.")
            }
            Command::Status => {
                let snapshot = self.cache.current().await;
                let subscriptions = self.store.list_all().await?.len();
                format::status(
                    snapshot.as_ref().map(|s| s.label.as_str()),
                    snapshot.as_ref().map(|s| s.captured_at),
                    snapshot.as_ref().map_or(0, |s| s.groups.len()),
                    snapshot.as_ref().map_or(0, |s| s.item_count()),
                    subscriptions,
                )
            }
            Command::Stats => {
                self.usage.flush(self.stats_store.as_ref()).await?;
                let counts = self.stats_store.load_counts().await?;
                format::usage_stats(&counts)
            }
            Command::Prompt(pending) => {
                self.chat_states
                    .set_chat_state(chat_id, pending.as_str())
                    .await?;
                match pending {
                    PendingCommand::Subscribe => format::plain(format::SUBSCRIBE_PROMPT),
                    PendingCommand::Unsubscribe => format::plain(format::UNSUBSCRIBE_PROMPT),
                }
            }
            Command::Lookup(course) => match self.cache.fresh().await {
                None => format::plain(NOT_LOADED_TEXT),
                Some(snapshot) => match snapshot.group(&course) {
                    Some(group) => format::group_details(&snapshot.label, group, snapshot.captured_at),
                    None => format::not_found(&course),
                },
            },
            Command::Unknown(command) => {
                format::plain(&format!("Unknown command {command}. Type /help to see what I can do."))
            }
        };
        Ok(reply)
    }

    async fn subscribe(&self, chat_id: i64, course: &str, raw_sections: &[String]) -> Result<String> {
        let Some(snapshot) = self.cache.fresh().await else {
            return Ok(format::plain(NOT_LOADED_TEXT));
        };
        if snapshot.group(course).is_none() {
            return Ok(format::not_found(course));
        }

        let mut sections: Vec<String> = Vec::with_capacity(raw_sections.len());
        let mut unknown: Vec<String> = Vec::new();
        for raw in raw_sections {
            match normalize_section(raw, &snapshot.item_prefixes) {
                Some(section) if !sections.contains(&section) => sections.push(section),
                Some(_) => {}
                None => unknown.push(raw.clone()),
            }
        }
        if let Some(missing) = self.cache.missing_items(course, &sections).await {
            unknown.extend(missing);
        }
        if !unknown.is_empty() {
            return Err(Error::Parse(format!(
                "Section(s) {} not found in {}",
                unknown.join(", "),
                course
            )));
        }

        self.store.upsert(chat_id, course, &sections).await?;
        info!(chat_id, course, sections = ?sections, "Subscribed");
        Ok(format::subscribed(course, &sections))
    }

    async fn unsubscribe(&self, chat_id: i64, course: &str, section: Option<&str>) -> Result<u64> {
        let removed = match section {
            Some(raw) => {
                let prefixes = match self.cache.current().await {
                    Some(snapshot) => snapshot.item_prefixes.clone(),
                    None => Vec::new(),
                };
                let normalized = normalize_section(raw, &prefixes);
                // Stored keys keep the feed's spelling; the prefix may be gone from it
                let stored = self.store.list_for_subscriber(chat_id).await?;
                let matched = stored.iter().find(|s| {
                    s.group_key == course
                        && (normalized.as_deref() == Some(s.item_key.as_str())
                            || s.item_key.eq_ignore_ascii_case(raw))
                });
                match matched {
                    Some(s) => self.store.remove_item(chat_id, course, &s.item_key).await?,
                    None => 0,
                }
            }
            None => self.store.remove_group(chat_id, course).await?,
        };
        info!(chat_id, course, section, removed, "Unsubscribed");
        Ok(removed)
    }
}

fn error_reply(chat_id: i64, e: &Error) -> String {
    match e {
        Error::Core(e) => {
            warn!(chat_id, error = %e, "Command failed");
            format::plain(&format_error_for_chat(e))
        }
        e => format::plain(&format!("❌ {e}")),
    }
}

async fn download_text(bot: &Bot, document: &Document) -> Result<String> {
    let file = bot.get_file(document.file.id.clone()).await?;
    let mut buf = Vec::new();
    bot.download_file(&file.path, &mut buf)
        .await
        .map_err(|e| Error::Telegram(e.to_string()))?;
    String::from_utf8(buf).map_err(|_| Error::Parse("The file is not a text file.".to_string()))
}

fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("subscribe", "Watch sections: /subscribe PHYS 161 1L"),
        BotCommand::new("unsubscribe", "Stop watching a section or course"),
        BotCommand::new("list", "Your subscriptions"),
        BotCommand::new("clear", "Drop every subscription"),
        BotCommand::new("next", "When the next check runs"),
        BotCommand::new("help", "How to use the bot"),
    ]
}
