//! Customized commands for Logbridge.
//!
//! Users define commands as notebook blocks linked to the
//! `local-telegram-bot` catalog page:
//!
//! - [`codec`] turns block text into [`Command`]s and back
//! - [`registry`] keeps the current catalog, rebuilt on notebook changes
//! - [`dispatcher`] routes `/query name …`, `/run name …` and `/name …`
//! - [`executor`] runs queries on the notebook and scripts in a [`Sandbox`]

pub mod argv;
pub mod codec;
pub mod command;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod registry;
pub mod sandbox;

pub use codec::{decode, encode, has_catalog_prefix, slash_template};
pub use command::{Command, CommandKind, CATALOG_PAGE, DEBUG_MARKER};
pub use dispatcher::{
    format_result, Builtin, Dispatch, Dispatcher, Reply, NOT_ALLOWED_IN_MESSAGE,
    NOT_A_VALID_COMMAND, UNKNOWN_ERROR,
};
pub use error::{CommandError, DecodeError, Result};
pub use executor::{ExecutionResult, ScriptExecutor};
pub use registry::{CatalogSync, CommandRegistry, Snapshot};
pub use sandbox::{ProcessSandbox, Sandbox, ScriptRequest};
