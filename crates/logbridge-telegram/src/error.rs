//! Error types for the Telegram bridge.

use thiserror::Error;

/// Errors that can occur in the Telegram bridge.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Settings could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] logbridge_core::CoreError),

    /// Failed to start the bot.
    #[error("Failed to start bot: {0}")]
    BotStartFailed(String),

    /// Nobody has talked to the bot yet, so there is nowhere to send.
    #[error("Authorized users need to send a message to the bot first")]
    NoRegisteredChats,

    /// The requested block does not exist.
    #[error("Block not found: {0}")]
    BlockNotFound(String),

    /// Notebook API error.
    #[error("Notebook error: {0}")]
    Notebook(#[from] logbridge_notebook::NotebookError),

    /// Customized command setup error.
    #[error("Command error: {0}")]
    Command(#[from] logbridge_commands::CommandError),

    /// Telegram API request error.
    #[error("Telegram request error: {0}")]
    Request(#[from] teloxide::RequestError),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result type for Telegram operations.
pub type Result<T> = std::result::Result<T, TelegramError>;
