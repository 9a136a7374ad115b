//! The slice of the Telegram Bot API the bridge's outbound side needs.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{FileId, ParseMode};

use crate::error::Result;

/// Build the download link for a file path returned by `getFile`.
pub fn file_link(token: &str, file_path: &str) -> String {
    format!("https://api.telegram.org/file/bot{token}/{file_path}")
}

/// Outbound Telegram operations.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Send an HTML-formatted message to a chat.
    async fn send_html(&self, chat_id: i64, html: &str) -> Result<()>;

    /// Resolve a file id to a download link.
    async fn file_url(&self, file_id: &str) -> Result<String>;
}

#[async_trait]
impl ChatApi for Bot {
    async fn send_html(&self, chat_id: i64, html: &str) -> Result<()> {
        self.send_message(ChatId(chat_id), html)
            .parse_mode(ParseMode::Html)
            .await?;
        Ok(())
    }

    async fn file_url(&self, file_id: &str) -> Result<String> {
        let file = self.get_file(FileId(file_id.to_string())).await?;
        Ok(file_link(self.token(), &file.path))
    }
}
