//! Sending notebook blocks to every registered chat.

use futures::future::join_all;
use logbridge_core::inline_html;
use logbridge_notebook::{Block, Notebook};
use tracing::{info, warn};

use crate::api::ChatApi;
use crate::error::{Result, TelegramError};

/// Indentation for each nesting level of a sent block.
const SEND_INDENT: &str = "\t\t";

/// Telegram HTML for a block and its children.
pub fn render_block(block: &Block) -> String {
    inline_html(block.to_text(SEND_INDENT).trim_end())
}

/// Send the block `uuid` (with its children) to every chat in `chats`.
///
/// Returns how many chats received it. Delivery failures to individual chats
/// are logged and do not fail the whole send.
pub async fn send_block(
    api: &dyn ChatApi,
    notebook: &dyn Notebook,
    chats: &[i64],
    uuid: &str,
) -> Result<usize> {
    if chats.is_empty() {
        return Err(TelegramError::NoRegisteredChats);
    }

    let block = notebook
        .block(uuid, true)
        .await?
        .ok_or_else(|| TelegramError::BlockNotFound(uuid.to_string()))?;
    let html = render_block(&block);

    let sends = chats.iter().map(|&chat_id| {
        let html = html.as_str();
        async move { (chat_id, api.send_html(chat_id, html).await) }
    });

    let mut delivered = 0;
    for (chat_id, result) in join_all(sends).await {
        match result {
            Ok(()) => delivered += 1,
            Err(e) => warn!(chat_id, error = %e, "Failed to send block"),
        }
    }

    info!(uuid = %uuid, delivered, chats = chats.len(), "Block sent");
    Ok(delivered)
}
