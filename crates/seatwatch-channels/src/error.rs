//! Error types for seatwatch-channels

use thiserror::Error;

/// Channel error type
#[derive(Debug, Error)]
pub enum Error {
    /// Telegram error
    #[error("telegram error: {0}")]
    Telegram(String),

    /// Command parsing error; the message is shown to the user as is
    #[error("{0}")]
    Parse(String),

    /// Core error
    #[error(transparent)]
    Core(#[from] seatwatch_core::Error),
}

impl From<teloxide::RequestError> for Error {
    fn from(e: teloxide::RequestError) -> Self {
        Self::Telegram(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
