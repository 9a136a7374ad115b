//! Main Telegram bot implementation.

use std::sync::Arc;

use logbridge_core::Settings;
use logbridge_notebook::TaskDate;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use tracing::{info, warn};

use crate::api::ChatApi;
use crate::error::{Result, TelegramError};
use crate::handlers::{handle_photo, handle_text, menu_commands};
use crate::jobs::{schedule_notifications, JobScheduler};
use crate::photos::refresh_photos;
use crate::send::send_block;
use crate::state::BridgeState;

/// The Telegram side of the bridge.
pub struct LogbridgeBot {
    /// The teloxide bot instance.
    bot: Bot,
    /// Shared state across handlers.
    state: Arc<BridgeState>,
    /// Daily notification jobs.
    jobs: JobScheduler,
}

impl LogbridgeBot {
    /// Create a bot talking to the Logseq API configured in `settings`.
    pub fn new(settings: Settings) -> Self {
        let bot = Bot::new(settings.bot_token.clone());
        Self::with_state(bot, Arc::new(BridgeState::from_settings(settings)))
    }

    /// Create a bot with custom state (for testing).
    pub fn with_state(bot: Bot, state: Arc<BridgeState>) -> Self {
        Self {
            bot,
            state,
            jobs: JobScheduler::new(),
        }
    }

    /// Shared state.
    pub fn state(&self) -> &Arc<BridgeState> {
        &self.state
    }

    /// Get the bot's username.
    pub async fn get_me(&self) -> Result<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| TelegramError::BotStartFailed(e.to_string()))?;
        Ok(me.username().to_string())
    }

    /// Start customized commands and the notification jobs the settings ask for.
    pub async fn prepare(&self) {
        let settings = &self.state.settings;

        if settings.enable_customized_command {
            self.state.enable_customized_commands().await;
        }

        let api: Arc<dyn ChatApi> = Arc::new(self.bot.clone());
        let jobs = [
            (TaskDate::Scheduled, settings.scheduled_notification_time),
            (TaskDate::Deadline, settings.deadline_notification_time),
        ];
        for (kind, time) in jobs {
            if let Some(time) = time {
                schedule_notifications(
                    &self.jobs,
                    kind,
                    time,
                    Arc::clone(&api),
                    Arc::clone(&self.state.notebook),
                    Arc::clone(&self.state.chats),
                );
            }
        }
    }

    /// Send block `uuid` to every registered chat.
    pub async fn send_block(&self, uuid: &str) -> Result<usize> {
        let chats = self.state.chats.chat_ids().await;
        send_block(&self.bot, self.state.notebook.as_ref(), &chats, uuid).await
    }

    /// Rewrite the photo links of block `uuid`.
    pub async fn refresh_photos(&self, uuid: &str) -> Result<usize> {
        refresh_photos(&self.bot, self.state.notebook.as_ref(), uuid).await
    }

    /// Start the bot in polling mode. Returns on Ctrl-C.
    pub async fn start_polling(&self) -> Result<()> {
        info!("Starting Telegram bot in polling mode...");

        let bot = self.bot.clone();
        let menu = menu_commands(self.state.dispatcher.customized_enabled());
        if let Err(e) = bot.set_my_commands(menu).await {
            warn!(error = %e, "Failed to set command menu");
        }

        let state_for_text = Arc::clone(&self.state);
        let state_for_photos = Arc::clone(&self.state);

        let handler = dptree::entry()
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.text().is_some())
                    .endpoint(move |bot: Bot, msg: Message| {
                        let state = Arc::clone(&state_for_text);
                        async move { handle_text(bot, msg, state).await }
                    }),
            )
            .branch(
                Update::filter_message()
                    .filter(|msg: Message| msg.photo().is_some())
                    .endpoint(move |bot: Bot, msg: Message| {
                        let state = Arc::clone(&state_for_photos);
                        info!(chat_id = %msg.chat.id, "Photo received");
                        async move { handle_photo(bot, msg, state).await }
                    }),
            );

        info!("Bot is running!");

        Dispatcher::builder(bot, handler)
            .default_handler(|upd| async move {
                tracing::debug!("Unhandled update: {:?}", upd);
            })
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }

    /// Prepare, then poll Telegram when `launch` is set, otherwise keep the
    /// jobs and catalog running until Ctrl-C.
    pub async fn run(&self, launch: bool) -> Result<()> {
        self.prepare().await;

        if launch {
            self.start_polling().await?;
        } else {
            info!("Not the main bot, Telegram polling disabled");
            tokio::signal::ctrl_c().await?;
        }

        self.stop().await;
        Ok(())
    }

    /// Stop background work.
    pub async fn stop(&self) {
        info!("Stopping Telegram bot...");
        self.jobs.cancel_all();
        self.state.disable_customized_commands().await;
        info!("Bot stopped");
    }
}
