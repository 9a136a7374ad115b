//! Logbridge Core - shared building blocks for the Logbridge crates.
//!
//! - **config**: state directory layout and env file locations
//! - **dates**: journal day numbers and message timestamps
//! - **markup**: inline markdown to Telegram HTML
//! - **settings**: typed runtime settings loaded from the environment

pub mod config;
pub mod dates;
pub mod error;
pub mod markup;
pub mod settings;

pub use config::{
    chat_ids_file, config_dir, ensure_all_dirs, env_file, load_env_files, runtime_state_dir,
    state_dir,
};
pub use dates::{journal_day, journal_day_after, timestamp_prefix};
pub use error::{CoreError, Result};
pub use markup::{html_escape, inline_html};
pub use settings::{Settings, DEFAULT_JOURNAL_PAGE};
