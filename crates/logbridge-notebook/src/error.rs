//! Error types for notebook access.

use thiserror::Error;

/// Errors that can occur while talking to the notebook.
#[derive(Debug, Error)]
pub enum NotebookError {
    /// The HTTP request could not be completed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The API answered with an error.
    #[error("Logseq API error ({method}): {message}")]
    Api { method: String, message: String },

    /// The API server rejected the token.
    #[error("Logseq API rejected the token")]
    Unauthorized,

    /// The response did not have the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A block referenced by uuid does not exist.
    #[error("block not found: {0}")]
    BlockNotFound(String),
}

/// Result type for notebook operations.
pub type Result<T> = std::result::Result<T, NotebookError>;

impl From<reqwest::Error> for NotebookError {
    fn from(e: reqwest::Error) -> Self {
        NotebookError::Http(e.to_string())
    }
}
