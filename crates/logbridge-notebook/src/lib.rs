//! Notebook access for Logbridge.
//!
//! The bridge never owns notebook data: every read and write goes through the
//! [`Notebook`] trait. [`LogseqClient`] implements it against the Logseq HTTP
//! API server; [`MemoryNotebook`] is an in-process stand-in for tests and dry
//! runs.
//!
//! # Example
//!
//! ```no_run
//! use logbridge_notebook::{LogseqClient, Notebook};
//!
//! # async fn demo() -> logbridge_notebook::Result<()> {
//! let url = "http://127.0.0.1:12315".parse().unwrap();
//! let client = LogseqClient::new(url, "token");
//! for block in client.linked_blocks("local-telegram-bot").await? {
//!     println!("{}", block.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod block;
pub mod client;
pub mod error;
pub mod inbox;
pub mod memory;
pub mod tasks;
pub mod traits;
pub mod watcher;

pub use block::Block;
pub use client::LogseqClient;
pub use error::{NotebookError, Result};
pub use inbox::InboxWriter;
pub use memory::MemoryNotebook;
pub use tasks::{find_tasks, TaskDate, OPEN_TASK_MARKERS};
pub use traits::{InsertOptions, Notebook};
pub use watcher::ChangeWatcher;
