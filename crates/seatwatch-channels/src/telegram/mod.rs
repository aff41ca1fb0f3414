//! Telegram - teloxide transport
//!
//! [`TelegramSink`] delivers notifications; [`TelegramBot`] runs the
//! dispatcher that serves subscription commands.

mod commands;
mod config;
mod format;
mod handler;
mod sink;


pub use commands::{
    normalize_course_name, normalize_section, parse_import, parse_subscribe_args, CallbackAction,
    Command, ImportLine, PendingCommand,
};
pub use config::TelegramConfig;
pub use handler::{BotStorage, TelegramBot};
pub use sink::TelegramSink;
