//! Telegram bridge for a Logseq notebook.
//!
//! This crate runs a Telegram bot that writes what authorized users send it
//! into a Logseq page, answers customized commands defined in the notebook,
//! and sends notebook blocks back to the chats it knows.
//!
//! # Features
//!
//! - Text and photo messages written to a page or today's journal, optionally
//!   under an inbox block and prefixed with the time
//! - `/query` and `/run` commands defined as blocks linking to the
//!   `local-telegram-bot` page, reloaded as the page changes
//! - Sending a block (and its children) to every registered chat
//! - Daily reminders about tasks scheduled or due tomorrow
//!
//! # Environment Variables
//!
//! Required:
//! - `TELEGRAM_BOT_TOKEN`: Bot token from @BotFather
//! - `LOGSEQ_API_TOKEN`: Authorization token of the Logseq HTTP API server
//!
//! Optional:
//! - `LOGSEQ_API_URL`: Logseq HTTP API server (default: http://127.0.0.1:12315)
//! - `LOGBRIDGE_AUTHORIZED_USERS`: Comma-separated Telegram usernames
//! - `LOGBRIDGE_PAGE_NAME`: Target page (default: `Journal`, today's journal)
//! - `LOGBRIDGE_INBOX_NAME`: Inbox block content (default: `#Inbox`)
//! - `LOGBRIDGE_ENABLE_CUSTOMIZED_COMMAND`: Serve customized commands
//! - `LOGBRIDGE_SCHEDULED_NOTIFICATION_TIME` / `LOGBRIDGE_DEADLINE_NOTIFICATION_TIME`: `HH:MM`
//!
//! # Example
//!
//! ```no_run
//! use logbridge_core::Settings;
//! use logbridge_telegram::LogbridgeBot;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::from_env()?;
//!     let launch = settings.is_main_bot;
//!     let bot = LogbridgeBot::new(settings);
//!
//!     bot.run(launch).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Commands
//!
//! - `/help` - Show available commands
//! - `/query <name> [args]` - Run a customized query
//! - `/run <name> [args]` - Run a customized script
//! - `/<name> [args]` - Shorthand for either

pub mod api;
pub mod bot;
pub mod chat_ids;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod photos;
pub mod send;
pub mod state;

pub use api::{file_link, ChatApi};
pub use bot::LogbridgeBot;
pub use chat_ids::ChatIds;
pub use error::{Result, TelegramError};
pub use handlers::{apply_code_entities, photo_block};
pub use jobs::{next_run, notify_tasks, JobScheduler, DEADLINE_JOB, SCHEDULED_JOB};
pub use photos::refresh_photos;
pub use send::{render_block, send_block};
pub use state::BridgeState;
