//! Seatwatch Channels - chat transports
//!
//! Telegram (via teloxide) is the only transport: it delivers tracker
//! notifications and serves the subscription commands.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod telegram;

pub use error::{Error, Result};

// Re-export Telegram transport
pub use telegram::{BotStorage, Command, TelegramBot, TelegramConfig, TelegramSink};
