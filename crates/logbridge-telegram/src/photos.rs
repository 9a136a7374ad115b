//! Refreshing photo links in notebook blocks.
//!
//! Telegram file links expire after a while. Photo blocks keep the file id
//! in their renderer macro, so a block can be rewritten with fresh links.

use std::collections::HashMap;
use std::sync::LazyLock;

use logbridge_notebook::Notebook;
use regex::{Captures, Regex};
use tracing::{debug, info};

use crate::api::ChatApi;
use crate::error::{Result, TelegramError};
use crate::handlers::photo_block;

static SHOW_PHOTO_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{renderer :local_telegram_bot-showPhoto,([^,}]*),([^}]*)\}\}!\[[^\]]*\]\([^)]*\)")
        .expect("Invalid photo renderer regex")
});

/// Rewrite every photo in block `uuid` with a fresh link.
///
/// Returns how many photos were refreshed; the block is left alone when it
/// shows none.
pub async fn refresh_photos(api: &dyn ChatApi, notebook: &dyn Notebook, uuid: &str) -> Result<usize> {
    let block = notebook
        .block(uuid, false)
        .await?
        .ok_or_else(|| TelegramError::BlockNotFound(uuid.to_string()))?;

    let mut urls: HashMap<String, String> = HashMap::new();
    for caps in SHOW_PHOTO_REGEX.captures_iter(&block.content) {
        let file_id = caps[2].to_string();
        if !urls.contains_key(&file_id) {
            let url = api.file_url(&file_id).await?;
            urls.insert(file_id, url);
        }
    }
    if urls.is_empty() {
        debug!(uuid = %uuid, "No photos to refresh");
        return Ok(0);
    }

    let mut refreshed = 0;
    let content = SHOW_PHOTO_REGEX.replace_all(&block.content, |caps: &Captures| {
        refreshed += 1;
        let url = urls.get(&caps[2]).map(String::as_str).unwrap_or_default();
        photo_block(&caps[1], &caps[2], url)
    });
    notebook.update_block(uuid, &content).await?;

    info!(uuid = %uuid, refreshed, "Photo links refreshed");
    Ok(refreshed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use logbridge_notebook::{Block, MemoryNotebook};

    struct FreshLinks;

    #[async_trait]
    impl ChatApi for FreshLinks {
        async fn send_html(&self, _chat_id: i64, _html: &str) -> Result<()> {
            Ok(())
        }

        async fn file_url(&self, file_id: &str) -> Result<String> {
            Ok(format!("https://new/{file_id}.jpg"))
        }
    }

    #[tokio::test]
    async fn test_refresh_every_photo() {
        let notebook = MemoryNotebook::new();
        let content = format!(
            "{} and {}",
            photo_block("cat", "A1", "https://old/A1.jpg"),
            photo_block("dog", "B2", "https://old/B2.jpg")
        );
        notebook.add_block("page", Block::new("p", content));

        assert_eq!(refresh_photos(&FreshLinks, &notebook, "p").await.unwrap(), 2);

        let block = notebook.page("page").remove(0);
        assert_eq!(
            block.content,
            format!(
                "{} and {}",
                photo_block("cat", "A1", "https://new/A1.jpg"),
                photo_block("dog", "B2", "https://new/B2.jpg")
            )
        );
    }

    #[tokio::test]
    async fn test_block_without_photos() {
        let notebook = MemoryNotebook::new();
        notebook.add_block("page", Block::new("p", "plain text"));
        assert_eq!(refresh_photos(&FreshLinks, &notebook, "p").await.unwrap(), 0);
        assert_eq!(notebook.page("page")[0].content, "plain text");
    }

    #[tokio::test]
    async fn test_missing_block() {
        let notebook = MemoryNotebook::new();
        let err = refresh_photos(&FreshLinks, &notebook, "x").await.unwrap_err();
        assert!(matches!(err, TelegramError::BlockNotFound(_)));
    }
}
