//! Error types for seatwatch-core
//!
//! This module provides error types and user-friendly error formatting.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Fetching the enrollment feed failed
    #[error("feed fetch error: {0}")]
    Feed(String),

    /// The fetched feed could not be parsed
    #[error("feed parse error: {0}")]
    Parse(String),

    /// Subscription store error
    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    /// Invalid configuration
    #[error("invalid configuration: {field}: {message}")]
    InvalidConfig {
        /// Config field name
        field: String,
        /// Detailed message
        message: String,
    },

    /// Transport failed to deliver a notification; may succeed on retry
    #[error("delivery error: {0}")]
    Delivery(String),

    /// Transport refused the notification (blocked bot, unknown chat)
    #[error("delivery rejected: {0}")]
    Rejected(String),

    /// The outbound queue has no consumer left
    #[error("delivery queue closed")]
    QueueClosed,

    /// Internal error (I/O, serialization, etc.)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for an [`Error::InvalidConfig`]
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same operation may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Feed(_) | Error::Delivery(_) | Error::Store(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Feed(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Internal(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
///
/// Provides human-readable error messages and suggestions for fixing.
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::Feed(_) => "🌐 Could not reach the course schedule.".to_string(),
            Error::Parse(_) => "📄 The course schedule could not be read.".to_string(),
            Error::Store(_) => "💾 Could not access your subscriptions.".to_string(),
            Error::InvalidConfig { field, message } => {
                format!("⚙️ Configuration error in '{}': {}", field, message)
            }
            Error::Delivery(_) | Error::Rejected(_) | Error::QueueClosed => {
                "📭 Notification could not be delivered.".to_string()
            }
            Error::Internal(_) => "❌ Internal error.".to_string(),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::Feed(_) | Error::Parse(_) => Some(
                "💡 The previous schedule is still shown. Please try again later.".to_string(),
            ),
            Error::Store(_) => Some("💡 Please try again in a moment.".to_string()),
            Error::InvalidConfig { field, .. } => Some(format!(
                "💡 Check the '{}' setting in config/default.toml or .env file.",
                field
            )),
            _ => None,
        }
    }
}

/// Format an error for display in a chat message
pub fn format_error_for_chat(error: &Error) -> String {
    let mut output = error.user_message();

    if let Some(suggestion) = error.suggestion() {
        output.push_str("\n\n");
        output.push_str(&suggestion);
    }

    output
}
