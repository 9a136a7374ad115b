//! Filesystem layout for Logbridge.
//!
//! All local state lives under `~/.logbridge/`:
//!
//! ```text
//! ~/.logbridge/
//! ├── config/       # .env.local with tokens
//! └── state/        # chat_ids.json and other runtime state
//! ```
//!
//! # Environment Variables
//!
//! - `LOGBRIDGE_STATE_DIR`: Override the base state directory
//! - `LOGBRIDGE_CONFIG_DIR`: Override the config directory

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::debug;

/// Environment variable for custom state directory.
pub const STATE_DIR_ENV: &str = "LOGBRIDGE_STATE_DIR";

/// Environment variable for custom config directory.
pub const CONFIG_DIR_ENV: &str = "LOGBRIDGE_CONFIG_DIR";

const DEFAULT_STATE_DIR: &str = ".logbridge";
const CONFIG_SUBDIR: &str = "config";
const STATE_SUBDIR: &str = "state";

static STATE_DIR_CACHE: OnceLock<PathBuf> = OnceLock::new();

/// Get the Logbridge state directory.
///
/// Resolved from `LOGBRIDGE_STATE_DIR`, then `~/.logbridge`, then
/// `.logbridge` in the current directory.
pub fn state_dir() -> PathBuf {
    STATE_DIR_CACHE
        .get_or_init(|| {
            std::env::var(STATE_DIR_ENV)
                .map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned()))
                .unwrap_or_else(|_| {
                    dirs::home_dir()
                        .map(|h| h.join(DEFAULT_STATE_DIR))
                        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
                })
        })
        .clone()
}

/// Get the config directory (`<state>/config` unless overridden).
pub fn config_dir() -> PathBuf {
    std::env::var(CONFIG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| state_dir().join(CONFIG_SUBDIR))
}

/// Get the runtime state directory.
pub fn runtime_state_dir() -> PathBuf {
    state_dir().join(STATE_SUBDIR)
}

/// Get the `.env.local` file holding secrets.
pub fn env_file() -> PathBuf {
    config_dir().join(".env.local")
}

/// Get the file mapping authorized usernames to chat ids.
pub fn chat_ids_file() -> PathBuf {
    runtime_state_dir().join("chat_ids.json")
}

/// Load env files: the config dir's `.env.local` first, then a local
/// `.env.local` or `.env`. Variables already set win.
pub fn load_env_files() {
    let path = env_file();
    if path.exists() {
        match dotenvy::from_path(&path) {
            Ok(()) => debug!(path = %path.display(), "Loaded env file"),
            Err(e) => debug!(path = %path.display(), error = %e, "Could not load env file"),
        }
    }
    let _ = dotenvy::from_filename(".env.local").or_else(|_| dotenvy::dotenv());
}

/// Ensure the config and runtime state directories exist.
///
/// # Errors
/// Returns an error if any directory cannot be created.
pub fn ensure_all_dirs() -> std::io::Result<()> {
    std::fs::create_dir_all(config_dir())?;
    std::fs::create_dir_all(runtime_state_dir())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_dir_shape() {
        let dir = state_dir();
        assert!(dir.is_absolute() || dir.ends_with(".logbridge"));
    }

    #[test]
    fn test_runtime_state_dir_name() {
        assert!(runtime_state_dir().ends_with("state"));
    }

    #[test]
    fn test_env_file_name() {
        assert!(env_file().ends_with(".env.local"));
    }

    #[test]
    fn test_chat_ids_file_name() {
        let file = chat_ids_file();
        assert!(file.ends_with("chat_ids.json"));
        assert!(file.parent().unwrap().ends_with("state"));
    }
}
