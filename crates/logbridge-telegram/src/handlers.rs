//! Message handlers for the Telegram bot.

use std::sync::Arc;

use chrono::Local;
use logbridge_commands::{Builtin, CommandKind, Dispatch, Reply};
use logbridge_core::timestamp_prefix;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, MessageEntity, MessageEntityKind, ParseMode};
use tracing::{debug, error, info, warn};

use crate::api::ChatApi;
use crate::state::BridgeState;

/// Reply when a message could not be written to the notebook.
pub const WRITE_FAILED: &str = "Failed to write this to Logseq";

/// Reply when a text message has no usable text.
pub const INVALID_MESSAGE: &str = "Message is not valid";

/// Reply when a photo message has no usable photo.
pub const INVALID_PHOTO: &str = "Photo is not valid";

/// Caption used for photos sent without one.
pub const DEFAULT_CAPTION: &str = "no caption";

/// Commands shown in the chat's command menu.
pub fn menu_commands(customized: bool) -> Vec<BotCommand> {
    let mut commands: Vec<BotCommand> = Builtin::ALL
        .into_iter()
        .map(|b| BotCommand::new(b.name(), b.description()))
        .collect();
    if customized {
        commands.extend(
            CommandKind::ALL
                .into_iter()
                .map(|kind| BotCommand::new(kind.tag(), kind.description())),
        );
    }
    commands
}

/// Wrap `code` and `pre` entities of `text` in backticks.
///
/// Entity offsets and lengths count UTF-16 code units. Text whose first
/// newline comes after its first character gets a fenced block, anything
/// else inline backticks. Overlapping or out-of-range entities are skipped.
pub fn apply_code_entities(text: &str, entities: &[MessageEntity]) -> String {
    let units: Vec<u16> = text.encode_utf16().collect();

    let mut code: Vec<&MessageEntity> = entities
        .iter()
        .filter(|e| matches!(e.kind, MessageEntityKind::Code | MessageEntityKind::Pre { .. }))
        .collect();
    if code.is_empty() {
        return text.to_string();
    }
    code.sort_by_key(|e| e.offset);

    let mut out = String::with_capacity(text.len() + code.len() * 6);
    let mut cursor = 0;
    for entity in code {
        let start = entity.offset;
        let end = start + entity.length;
        if start < cursor || end > units.len() {
            continue;
        }

        out.push_str(&String::from_utf16_lossy(&units[cursor..start]));
        let inner = String::from_utf16_lossy(&units[start..end]);
        let fence = if inner.find('\n').is_some_and(|i| i > 0) {
            "```"
        } else {
            "`"
        };
        out.push_str(fence);
        out.push_str(&inner);
        out.push_str(fence);
        cursor = end;
    }
    out.push_str(&String::from_utf16_lossy(&units[cursor..]));
    out
}

/// Block text showing a photo; the renderer part lets the link be refreshed later.
pub fn photo_block(caption: &str, file_id: &str, url: &str) -> String {
    format!("{{{{renderer :local_telegram_bot-showPhoto,{caption},{file_id}}}}}![{caption}]({url})")
}

/// Drop messages from users who are not authorized; remember the chat of
/// those who are.
async fn admit(msg: &Message, state: &BridgeState) -> bool {
    let username = msg.from.as_ref().and_then(|u| u.username.as_deref());
    if !state.is_authorized(username) {
        debug!(chat_id = %msg.chat.id, username = ?username, "Message from unauthorized user ignored");
        return false;
    }
    if let Some(username) = username {
        state.chats.record(username, msg.chat.id.0).await;
    }
    true
}

async fn send_reply(bot: &Bot, chat_id: ChatId, reply: Reply) -> ResponseResult<()> {
    match reply {
        Reply::Text(text) => {
            bot.send_message(chat_id, text).await?;
        }
        Reply::Html(html) => {
            bot.send_message(chat_id, html)
                .parse_mode(ParseMode::Html)
                .await?;
        }
    }
    Ok(())
}

/// Write `text` to the notebook and tell the chat if that failed.
async fn write_note(bot: &Bot, msg: &Message, state: &BridgeState, text: String) -> ResponseResult<()> {
    let text = if state.settings.add_timestamp {
        format!("{} - {}", timestamp_prefix(&msg.date.with_timezone(&Local)), text)
    } else {
        text
    };

    match state.inbox.write(&text, Local::now().date_naive()).await {
        Ok(Some(block)) => {
            info!(chat_id = %msg.chat.id, uuid = %block.uuid, "Message written to notebook");
        }
        Ok(None) => {
            warn!(chat_id = %msg.chat.id, page = %state.settings.page_name, "No place to write message");
            bot.send_message(msg.chat.id, WRITE_FAILED).await?;
        }
        Err(e) => {
            error!(chat_id = %msg.chat.id, error = %e, "Failed to write message");
            bot.send_message(msg.chat.id, WRITE_FAILED).await?;
        }
    }
    Ok(())
}

/// Handle a text message: run it as a command, or write it to the notebook.
pub async fn handle_text(bot: Bot, msg: Message, state: Arc<BridgeState>) -> ResponseResult<()> {
    if !admit(&msg, &state).await {
        return Ok(());
    }

    let Some(text) = msg.text().filter(|t| !t.trim().is_empty()) else {
        bot.send_message(msg.chat.id, INVALID_MESSAGE).await?;
        return Ok(());
    };

    match state.dispatcher.dispatch(text).await {
        Dispatch::Reply(reply) => {
            debug!(chat_id = %msg.chat.id, "Command handled");
            send_reply(&bot, msg.chat.id, reply).await
        }
        Dispatch::NotACommand => {
            let text = apply_code_entities(text, msg.entities().unwrap_or_default());
            write_note(&bot, &msg, &state, text).await
        }
    }
}

/// Handle a photo message: write a block showing the largest size.
pub async fn handle_photo(bot: Bot, msg: Message, state: Arc<BridgeState>) -> ResponseResult<()> {
    if !admit(&msg, &state).await {
        return Ok(());
    }

    let Some(photo) = msg
        .photo()
        .and_then(|sizes| sizes.iter().max_by_key(|p| u64::from(p.width) * u64::from(p.height)))
    else {
        bot.send_message(msg.chat.id, INVALID_PHOTO).await?;
        return Ok(());
    };

    let file_id = photo.file.id.to_string();
    let url = match bot.file_url(&file_id).await {
        Ok(url) => url,
        Err(e) => {
            error!(chat_id = %msg.chat.id, error = %e, "Failed to get photo link");
            bot.send_message(msg.chat.id, INVALID_PHOTO).await?;
            return Ok(());
        }
    };

    let caption = msg
        .caption()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CAPTION);
    write_note(&bot, &msg, &state, photo_block(caption, &file_id, &url)).await
}
