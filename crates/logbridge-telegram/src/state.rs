//! State shared by the bot's handlers and background jobs.

use std::sync::Arc;

use async_trait::async_trait;
use logbridge_commands::{
    CatalogSync, CommandError, CommandRegistry, Dispatcher, ExecutionResult, ProcessSandbox,
    Sandbox, ScriptExecutor, ScriptRequest,
};
use logbridge_core::{config, Settings};
use logbridge_notebook::{InboxWriter, LogseqClient, Notebook};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chat_ids::ChatIds;

/// Stands in for the script runtime when it cannot be found, so queries keep
/// working and `run` commands fail cleanly.
struct MissingRuntime(String);

#[async_trait]
impl Sandbox for MissingRuntime {
    async fn run(&self, _request: ScriptRequest) -> logbridge_commands::Result<ExecutionResult> {
        Err(CommandError::RuntimeNotFound(self.0.clone()))
    }
}

/// Everything a handler needs.
pub struct BridgeState {
    /// Bridge settings.
    pub settings: Settings,
    /// The notebook messages are written to and commands run against.
    pub notebook: Arc<dyn Notebook>,
    /// Writes inbound messages.
    pub inbox: InboxWriter,
    /// Routes `/…` messages.
    pub dispatcher: Dispatcher,
    /// Chats outbound messages go to.
    pub chats: Arc<ChatIds>,
    catalog: Mutex<Option<CatalogSync>>,
}

impl BridgeState {
    /// Assemble the state from its parts.
    pub fn new(
        settings: Settings,
        notebook: Arc<dyn Notebook>,
        sandbox: Arc<dyn Sandbox>,
        chats: ChatIds,
    ) -> Self {
        let registry = Arc::new(CommandRegistry::new());
        let executor = ScriptExecutor::new(Arc::clone(&notebook), sandbox);
        let dispatcher = Dispatcher::new(registry, executor)
            .with_customized(false)
            .with_commands_from_message(settings.enable_customized_command_from_message);
        let inbox = InboxWriter::from_settings(Arc::clone(&notebook), &settings);

        Self {
            settings,
            notebook,
            inbox,
            dispatcher,
            chats: Arc::new(chats),
            catalog: Mutex::new(None),
        }
    }

    /// State talking to the Logseq HTTP API, with scripts run by the
    /// configured runtime and chats persisted in the state directory.
    pub fn from_settings(settings: Settings) -> Self {
        let notebook: Arc<dyn Notebook> = Arc::new(LogseqClient::from_settings(&settings));

        let runtime = settings.script_runtime.clone();
        let sandbox: Arc<dyn Sandbox> = match ProcessSandbox::new(
            &runtime,
            settings.logseq_api_url.clone(),
            settings.logseq_api_token.clone(),
        ) {
            Ok(sandbox) => Arc::new(sandbox),
            Err(e) => {
                warn!(runtime = %runtime.display(), error = %e, "Script runtime unavailable, run commands disabled");
                Arc::new(MissingRuntime(runtime.display().to_string()))
            }
        };

        let chats = ChatIds::load(config::chat_ids_file(), &settings.authorized_users);
        Self::new(settings, notebook, sandbox, chats)
    }

    /// Whether the Telegram user `username` may use the bot.
    pub fn is_authorized(&self, username: Option<&str>) -> bool {
        self.settings.is_user_authorized(username)
    }

    /// Start serving customized commands, keeping the catalog in sync with
    /// the notebook. Does nothing if already enabled.
    pub async fn enable_customized_commands(&self) {
        let mut catalog = self.catalog.lock().await;
        if catalog.is_some() {
            return;
        }

        let sync = CatalogSync::polling(
            Arc::clone(self.dispatcher.registry()),
            Arc::clone(&self.notebook),
            self.settings.catalog_poll_interval,
        )
        .await;
        *catalog = Some(sync);
        self.dispatcher.set_customized(true);
        info!(
            commands = self.dispatcher.registry().snapshot().len(),
            "Customized commands enabled"
        );
    }

    /// Stop serving customized commands and forget the catalog.
    pub async fn disable_customized_commands(&self) {
        self.dispatcher.set_customized(false);
        if let Some(sync) = self.catalog.lock().await.take() {
            sync.stop().await;
            info!("Customized commands disabled");
        } else {
            debug!("Customized commands already disabled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logbridge_commands::{encode, Command, CommandKind, Dispatch, Reply};
    use logbridge_notebook::{Block, MemoryNotebook};
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_settings() -> Settings {
        Settings::from_lookup(|key| match key {
            "TELEGRAM_BOT_TOKEN" => Some(format!("123456789:{}", "A".repeat(35))),
            "LOGSEQ_API_TOKEN" => Some("secret".to_string()),
            "LOGBRIDGE_PAGE_NAME" => Some("Inbox Page".to_string()),
            "LOGBRIDGE_CATALOG_POLL_MS" => Some("10".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_toggle_customized_commands() {
        let dir = TempDir::new().unwrap();
        let notebook = Arc::new(MemoryNotebook::new());
        let greet = Command::new(CommandKind::Run, "greet", "return 1;");
        notebook.add_block("commands", Block::new("g", encode(&greet)));

        let state = BridgeState::new(
            test_settings(),
            notebook,
            Arc::new(MissingRuntime("node".to_string())),
            ChatIds::load(dir.path().join("chat_ids.json"), &[]),
        );
        assert!(!state.dispatcher.customized_enabled());

        state.enable_customized_commands().await;
        assert!(state.dispatcher.registry().lookup(CommandKind::Run, "greet").is_some());

        // The runtime is missing, so the failure stays internal.
        assert_eq!(
            state.dispatcher.dispatch("/greet").await,
            Dispatch::Reply(Reply::Text(logbridge_commands::UNKNOWN_ERROR.to_string()))
        );

        state.disable_customized_commands().await;
        assert!(state.dispatcher.registry().snapshot().is_empty());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(state.dispatcher.registry().snapshot().is_empty());
    }
}
