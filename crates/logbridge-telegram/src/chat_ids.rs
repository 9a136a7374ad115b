//! Registered chats: which chat each authorized user talks to the bot from.
//!
//! Outbound messages go to every chat in this map, so a user only starts
//! receiving them after sending the bot something. The map is kept on disk
//! as `{"username": chat_id}` JSON.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::error::Result;

/// Writes JSON to `path` through a temp file in the same directory and a rename.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(value)?;
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut temp_file = tempfile::NamedTempFile::new_in(dir)?;
    temp_file.write_all(json.as_bytes())?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Username to chat id map, persisted on every change.
#[derive(Debug)]
pub struct ChatIds {
    path: PathBuf,
    authorized_users: Vec<String>,
    ids: RwLock<BTreeMap<String, i64>>,
}

impl ChatIds {
    /// Load the map from `path`, dropping users no longer authorized.
    ///
    /// An empty `authorized_users` list authorizes everyone, so nothing is
    /// pruned. A missing or unreadable file starts an empty map.
    pub fn load(path: impl Into<PathBuf>, authorized_users: &[String]) -> Self {
        let path = path.into();
        let mut ids = read_map(&path);

        let before = ids.len();
        if !authorized_users.is_empty() {
            ids.retain(|user, _| authorized_users.contains(user));
        }
        if ids.len() != before {
            info!(removed = before - ids.len(), "Pruned chats of users no longer authorized");
            if let Err(e) = atomic_write_json(&path, &ids) {
                error!(error = %e, path = %path.display(), "Failed to save registered chats");
            }
        }

        Self {
            path,
            authorized_users: authorized_users.to_vec(),
            ids: RwLock::new(ids),
        }
    }

    /// Remember that `username` talks to the bot from `chat_id`.
    ///
    /// Returns whether the map changed. Users outside the authorized list
    /// are ignored.
    pub async fn record(&self, username: &str, chat_id: i64) -> bool {
        if !self.authorized_users.is_empty() && !self.authorized_users.iter().any(|u| u == username) {
            return false;
        }

        let mut ids = self.ids.write().await;
        if ids.get(username) == Some(&chat_id) {
            return false;
        }
        ids.insert(username.to_string(), chat_id);
        info!(username = %username, chat_id, "Registered chat");

        if let Err(e) = atomic_write_json(&self.path, &*ids) {
            error!(error = %e, path = %self.path.display(), "Failed to save registered chats");
        } else {
            debug!(count = ids.len(), path = %self.path.display(), "Saved registered chats");
        }
        true
    }

    /// Every registered chat id.
    pub async fn chat_ids(&self) -> Vec<i64> {
        let ids = self.ids.read().await;
        let mut chats: Vec<i64> = ids.values().copied().collect();
        chats.sort_unstable();
        chats.dedup();
        chats
    }

    /// Chat id registered for `username`.
    pub async fn get(&self, username: &str) -> Option<i64> {
        self.ids.read().await.get(username).copied()
    }

    /// File backing the map.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_map(path: &Path) -> BTreeMap<String, i64> {
    if !path.exists() {
        return BTreeMap::new();
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<BTreeMap<String, i64>>(&content) {
            Ok(ids) => {
                info!(count = ids.len(), "Loaded registered chats from disk");
                ids
            }
            Err(e) => {
                error!(error = %e, path = %path.display(), "Failed to parse registered chats file");
                BTreeMap::new()
            }
        },
        Err(e) => {
            error!(error = %e, path = %path.display(), "Failed to read registered chats file");
            BTreeMap::new()
        }
    }
}
