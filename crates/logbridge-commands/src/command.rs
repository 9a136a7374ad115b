//! Customized command model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Page whose inbound links enumerate the customized commands.
pub const CATALOG_PAGE: &str = "local-telegram-bot";

/// Renderer macro trailing a command signature in the notebook.
pub const DEBUG_MARKER: &str = "{{renderer :local_telegram_bot-debugCmd}}";

/// How a command's script is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandKind {
    /// Datascript query against the notebook.
    Query,
    /// JavaScript function body run in a sandbox.
    Run,
}

impl CommandKind {
    /// All kinds, in help order.
    pub const ALL: [CommandKind; 2] = [CommandKind::Query, CommandKind::Run];

    /// Textual tag (`query` / `run`).
    pub fn tag(self) -> &'static str {
        match self {
            CommandKind::Query => "query",
            CommandKind::Run => "run",
        }
    }

    /// Fence language used when encoding the script.
    pub fn language(self) -> &'static str {
        match self {
            CommandKind::Query => "clojure",
            CommandKind::Run => "js",
        }
    }

    /// One-line help for `/query` and `/run`.
    pub fn description(self) -> &'static str {
        match self {
            CommandKind::Query => "Query customized datascript",
            CommandKind::Run => "Run customized js",
        }
    }

    /// Catalog link that starts a command block, e.g. `[[local-telegram-bot/run]]`.
    pub fn prefix(self) -> String {
        format!("[[{CATALOG_PAGE}/{}]]", self.tag())
    }

    /// Label of the slash command that inserts a definition skeleton.
    pub fn slash_label(self) -> &'static str {
        match self {
            CommandKind::Query => "Local Telegram Bot: Define Customized Query",
            CommandKind::Run => "Local Telegram Bot: Define Customized Run",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for CommandKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" => Ok(CommandKind::Query),
            "run" => Ok(CommandKind::Run),
            _ => Err(()),
        }
    }
}

/// A user-defined command stored as notebook block text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    /// Dispatch name, unique within `kind`.
    pub name: String,
    /// Parameter names, bound positionally to invocation arguments.
    pub params: Vec<String>,
    pub script: String,
    pub description: String,
}

impl Command {
    /// Create a command without description.
    pub fn new(kind: CommandKind, name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            params: Vec::new(),
            script: script.into(),
            description: String::new(),
        }
    }

    /// Set the parameter names.
    pub fn with_params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Help line: `[/query name|/name] p0 p1: description`.
    pub fn help_line(&self) -> String {
        format!(
            "[/{kind} {name}|/{name}] {params}: {description}",
            kind = self.kind,
            name = self.name,
            params = self.params.join(" "),
            description = self.description,
        )
    }
}
