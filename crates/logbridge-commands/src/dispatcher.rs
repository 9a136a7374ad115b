//! Routing of chat commands to built-ins and customized commands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use logbridge_core::inline_html;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::argv::{to_values, tokenize};
use crate::codec::has_catalog_prefix;
use crate::command::{Command, CommandKind};
use crate::executor::{ExecutionResult, ScriptExecutor};
use crate::registry::CommandRegistry;

/// Reply to an unknown or malformed command.
pub const NOT_A_VALID_COMMAND: &str = "not a valid command";
/// Reply when a command produced nothing to show.
pub const UNKNOWN_ERROR: &str = "unknown error";
/// Reply to a catalog definition pasted into chat while that is disabled.
pub const NOT_ALLOWED_IN_MESSAGE: &str = "Command is not allowed in message";

/// Commands handled by the bridge itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Help,
}

impl Builtin {
    pub const ALL: [Builtin; 1] = [Builtin::Help];

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Help => "help",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Builtin::Help => "List all available commands",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|b| b.name() == key)
    }
}

/// Text to send back to the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Plain text.
    Text(String),
    /// Telegram HTML.
    Html(String),
}

impl Reply {
    fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }

    /// The reply body, whatever its format.
    pub fn as_str(&self) -> &str {
        match self {
            Reply::Text(s) | Reply::Html(s) => s,
        }
    }
}

/// Outcome of handing a message to the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Not a command; handle as an ordinary message.
    NotACommand,
    /// A command was handled; send this back.
    Reply(Reply),
}

/// Turns a command result into a chat reply.
pub fn format_result(result: &ExecutionResult) -> Reply {
    if let Some(value) = result.returned() {
        let text = match value {
            Value::String(s) => s.clone(),
            other => pretty_json(other),
        };
        return Reply::Html(inline_html(&text));
    }
    if !result.logs.is_empty() {
        return Reply::Text(pretty_json(&Value::Array(result.logs.clone())));
    }
    Reply::text(UNKNOWN_ERROR)
}

fn pretty_json(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Routes `/…` text to built-ins and customized commands.
///
/// Authorization happens before a message gets here; every message that
/// reaches the dispatcher is allowed to run commands.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    executor: ScriptExecutor,
    customized: AtomicBool,
    from_message: bool,
}

impl Dispatcher {
    /// Dispatcher with customized commands enabled and catalog text in
    /// messages rejected.
    pub fn new(registry: Arc<CommandRegistry>, executor: ScriptExecutor) -> Self {
        Self {
            registry,
            executor,
            customized: AtomicBool::new(true),
            from_message: false,
        }
    }

    /// Enable or disable customized commands.
    pub fn with_customized(self, enabled: bool) -> Self {
        self.customized.store(enabled, Ordering::SeqCst);
        self
    }

    /// Allow messages that start with a catalog link.
    pub fn with_commands_from_message(mut self, allowed: bool) -> Self {
        self.from_message = allowed;
        self
    }

    /// Toggle customized commands at runtime.
    pub fn set_customized(&self, enabled: bool) {
        self.customized.store(enabled, Ordering::SeqCst);
    }

    pub fn customized_enabled(&self) -> bool {
        self.customized.load(Ordering::SeqCst)
    }

    /// Registry the dispatcher resolves names against.
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Handle one message text.
    pub async fn dispatch(&self, text: &str) -> Dispatch {
        if !self.from_message && has_catalog_prefix(text) {
            info!("command definition is not allowed in message");
            return Dispatch::Reply(Reply::text(NOT_ALLOWED_IN_MESSAGE));
        }

        let Some(rest) = text.strip_prefix('/') else {
            return Dispatch::NotACommand;
        };

        let tokens = match tokenize(rest) {
            Ok(tokens) => tokens,
            Err(e) => {
                debug!(error = %e, "cannot split command");
                return Dispatch::Reply(Reply::text(NOT_A_VALID_COMMAND));
            }
        };
        let Some(first) = tokens.first() else {
            return Dispatch::Reply(Reply::text(NOT_A_VALID_COMMAND));
        };
        // `/help@my_bot` in group chats
        let key = first.split('@').next().unwrap_or_default();

        if let Some(builtin) = Builtin::from_key(key) {
            return Dispatch::Reply(self.run_builtin(builtin, &tokens[1..]));
        }

        match self.resolve(key, &tokens) {
            Some((command, args)) => Dispatch::Reply(self.run(&command, args).await),
            None => {
                debug!(key = %key, "no command matched");
                Dispatch::Reply(Reply::text(NOT_A_VALID_COMMAND))
            }
        }
    }

    /// Find the customized command for `key`: `/query name …`, `/run name …`,
    /// or the `/name …` shorthand (query first, then run).
    fn resolve<'t>(&self, key: &str, tokens: &'t [String]) -> Option<(Command, &'t [String])> {
        if !self.customized_enabled() {
            return None;
        }

        if let Ok(kind) = key.parse::<CommandKind>() {
            let name = tokens.get(1)?;
            return self
                .registry
                .lookup(kind, name)
                .map(|command| (command, &tokens[2..]));
        }

        let snapshot = self.registry.snapshot();
        CommandKind::ALL
            .into_iter()
            .find_map(|kind| snapshot.get(kind, key).cloned())
            .map(|command| (command, &tokens[1..]))
    }

    fn run_builtin(&self, builtin: Builtin, _args: &[String]) -> Reply {
        match builtin {
            Builtin::Help => Reply::Text(self.help()),
        }
    }

    async fn run(&self, command: &Command, args: &[String]) -> Reply {
        if command.script.is_empty() {
            return Reply::text(NOT_A_VALID_COMMAND);
        }

        info!(kind = %command.kind, name = %command.name, "running customized command");
        match self.executor.execute(command, to_values(args)).await {
            Ok(result) => format_result(&result),
            Err(e) if e.is_internal() => {
                error!(kind = %command.kind, name = %command.name, error = %e, "command failed");
                Reply::text(UNKNOWN_ERROR)
            }
            Err(e) => Reply::Text(e.to_string()),
        }
    }

    /// Text of the `/help` reply.
    pub fn help(&self) -> String {
        let mut msg = String::from("Available commands:\n");
        for builtin in Builtin::ALL {
            msg.push_str(&format!("/{}: {}\n", builtin.name(), builtin.description()));
        }

        if self.customized_enabled() {
            for kind in CommandKind::ALL {
                msg.push_str(&format!("/{}: {}\n", kind.tag(), kind.description()));
            }

            let snapshot = self.registry.snapshot();
            if !snapshot.is_empty() {
                msg.push_str("\nCustomized commands:\n");
                for command in snapshot.iter() {
                    msg.push_str(&command.help_line());
                    msg.push('\n');
                }
            }
        }
        msg
    }
}
