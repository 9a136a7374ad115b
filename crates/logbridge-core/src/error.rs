//! Error types for core configuration.

use thiserror::Error;

/// Errors raised while loading configuration and settings.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A required setting is missing.
    #[error("{0} not set")]
    MissingSetting(&'static str),

    /// A setting has a value that cannot be used.
    #[error("invalid value for {key}: {value}")]
    InvalidSetting { key: &'static str, value: String },

    /// The Telegram bot token does not look like one.
    #[error("Bot Token is not valid")]
    InvalidBotToken,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
