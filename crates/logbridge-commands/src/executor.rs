//! Script execution for customized commands.

use std::sync::Arc;

use logbridge_notebook::Notebook;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::command::{Command, CommandKind};
use crate::error::Result;
use crate::sandbox::{Sandbox, ScriptRequest};

/// What a command produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Returned value; `None` or `null` means nothing was returned.
    #[serde(default)]
    pub result: Option<Value>,
    /// Captured console output, in call order.
    #[serde(default)]
    pub logs: Vec<Value>,
}

impl ExecutionResult {
    /// A result with a value and no logs.
    pub fn value(result: Value) -> Self {
        Self {
            result: Some(result),
            logs: Vec::new(),
        }
    }

    /// The returned value, unless absent or `null`.
    pub fn returned(&self) -> Option<&Value> {
        self.result.as_ref().filter(|v| !v.is_null())
    }
}

/// Runs command scripts against the notebook or the sandbox.
pub struct ScriptExecutor {
    notebook: Arc<dyn Notebook>,
    sandbox: Arc<dyn Sandbox>,
}

impl ScriptExecutor {
    pub fn new(notebook: Arc<dyn Notebook>, sandbox: Arc<dyn Sandbox>) -> Self {
        Self { notebook, sandbox }
    }

    /// Run `command` with positional `args`.
    pub async fn execute(&self, command: &Command, args: Vec<Value>) -> Result<ExecutionResult> {
        debug!(kind = %command.kind, name = %command.name, args = args.len(), "executing command");
        match command.kind {
            CommandKind::Query => {
                let rows = self.notebook.query(&command.script, &args).await?;
                Ok(ExecutionResult {
                    result: rows,
                    logs: Vec::new(),
                })
            }
            CommandKind::Run => {
                self.sandbox
                    .run(ScriptRequest {
                        body: command.script.clone(),
                        params: command.params.clone(),
                        args,
                    })
                    .await
            }
        }
    }
}
