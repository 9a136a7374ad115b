//! Error types for customized commands.

use logbridge_notebook::NotebookError;
use thiserror::Error;

/// Why a block's text is not a command definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The text does not start with a catalog link.
    #[error("text does not start with a command catalog link")]
    UnknownPrefix,

    /// No fenced script block.
    #[error("command has no fenced script")]
    MissingFence,

    /// The signature line has no name.
    #[error("command has no name")]
    EmptyName,
}

/// Errors raised while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The script itself failed; the message is shown to the user as-is.
    #[error("{0}")]
    Script(String),

    /// The notebook rejected the query or could not be reached.
    #[error("{0}")]
    Notebook(#[from] NotebookError),

    /// The script runtime binary was not found.
    #[error("script runtime not found: {0}")]
    RuntimeNotFound(String),

    /// The sandbox process misbehaved.
    #[error("sandbox error: {0}")]
    Sandbox(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CommandError {
    /// Whether this is a fault of the bridge rather than of the user's script.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            CommandError::RuntimeNotFound(_) | CommandError::Sandbox(_) | CommandError::Io(_) | CommandError::Json(_)
        )
    }
}

/// Result type for command operations.
pub type Result<T> = std::result::Result<T, CommandError>;
