//! Typed runtime settings.
//!
//! Settings are read once from the environment (after env files are loaded)
//! and passed explicitly to every component that needs them.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::NaiveTime;
use regex::Regex;
use url::Url;

use crate::error::{CoreError, Result};

/// Page name that stands for "today's journal page".
pub const DEFAULT_JOURNAL_PAGE: &str = "Journal";

const DEFAULT_INBOX_NAME: &str = "#Inbox";
const DEFAULT_LOGSEQ_API_URL: &str = "http://127.0.0.1:12315";
const DEFAULT_SCRIPT_RUNTIME: &str = "node";
const DEFAULT_CATALOG_POLL_MS: u64 = 2000;

static BOT_TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{8,10}:[a-zA-Z0-9_-]{35}$").expect("Invalid token regex"));

/// Bridge settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Telegram bot token from @BotFather.
    pub bot_token: String,
    /// Only the main bot polls Telegram; others only serve notebook-side operations.
    pub is_main_bot: bool,
    /// Telegram usernames allowed to talk to the bot. Empty allows everyone.
    pub authorized_users: Vec<String>,
    /// Page receiving inbound messages. `Journal` means today's journal.
    pub page_name: String,
    /// Content of the block inbound messages are nested under. Empty disables it.
    pub inbox_name: String,
    /// Append new blocks at the bottom instead of the top.
    pub append_at_bottom: bool,
    /// Prefix inbound messages with `HH:MM - `.
    pub add_timestamp: bool,
    /// Daily time for the reminder about tasks scheduled tomorrow.
    pub scheduled_notification_time: Option<NaiveTime>,
    /// Daily time for the reminder about tasks due tomorrow.
    pub deadline_notification_time: Option<NaiveTime>,
    /// Serve customized commands from the catalog page.
    pub enable_customized_command: bool,
    /// Accept catalog-prefixed text in ordinary messages.
    pub enable_customized_command_from_message: bool,
    /// Logseq HTTP API server.
    pub logseq_api_url: Url,
    /// Logseq HTTP API authorization token.
    pub logseq_api_token: String,
    /// JavaScript runtime used for `run` commands.
    pub script_runtime: PathBuf,
    /// How often the catalog page is checked for edits.
    pub catalog_poll_interval: Duration,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let bot_token = get("TELEGRAM_BOT_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or(CoreError::MissingSetting("TELEGRAM_BOT_TOKEN"))?;
        if !is_valid_bot_token(&bot_token) {
            return Err(CoreError::InvalidBotToken);
        }

        let logseq_api_token = get("LOGSEQ_API_TOKEN")
            .filter(|t| !t.is_empty())
            .ok_or(CoreError::MissingSetting("LOGSEQ_API_TOKEN"))?;

        let logseq_api_url = match get("LOGSEQ_API_URL").filter(|v| !v.is_empty()) {
            Some(raw) => Url::parse(&raw).map_err(|_| CoreError::InvalidSetting {
                key: "LOGSEQ_API_URL",
                value: raw,
            })?,
            None => Url::parse(DEFAULT_LOGSEQ_API_URL).map_err(|_| CoreError::InvalidSetting {
                key: "LOGSEQ_API_URL",
                value: DEFAULT_LOGSEQ_API_URL.to_string(),
            })?,
        };

        let page_name = get("LOGBRIDGE_PAGE_NAME")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_JOURNAL_PAGE.to_string());

        let inbox_name = get("LOGBRIDGE_INBOX_NAME").unwrap_or_else(|| DEFAULT_INBOX_NAME.to_string());

        let script_runtime = get("LOGBRIDGE_SCRIPT_RUNTIME")
            .filter(|v| !v.is_empty())
            .map(|v| PathBuf::from(shellexpand::tilde(&v).into_owned()))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRIPT_RUNTIME));

        let catalog_poll_ms = match get("LOGBRIDGE_CATALOG_POLL_MS").filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(CoreError::InvalidSetting {
                    key: "LOGBRIDGE_CATALOG_POLL_MS",
                    value: raw,
                })?,
            None => DEFAULT_CATALOG_POLL_MS,
        };

        Ok(Self {
            bot_token,
            is_main_bot: parse_bool("LOGBRIDGE_MAIN_BOT", get("LOGBRIDGE_MAIN_BOT"), true)?,
            authorized_users: parse_user_list(get("LOGBRIDGE_AUTHORIZED_USERS").as_deref()),
            page_name,
            inbox_name,
            append_at_bottom: parse_bool(
                "LOGBRIDGE_APPEND_AT_BOTTOM",
                get("LOGBRIDGE_APPEND_AT_BOTTOM"),
                false,
            )?,
            add_timestamp: parse_bool("LOGBRIDGE_ADD_TIMESTAMP", get("LOGBRIDGE_ADD_TIMESTAMP"), false)?,
            scheduled_notification_time: parse_time(
                "LOGBRIDGE_SCHEDULED_NOTIFICATION_TIME",
                get("LOGBRIDGE_SCHEDULED_NOTIFICATION_TIME"),
            )?,
            deadline_notification_time: parse_time(
                "LOGBRIDGE_DEADLINE_NOTIFICATION_TIME",
                get("LOGBRIDGE_DEADLINE_NOTIFICATION_TIME"),
            )?,
            enable_customized_command: parse_bool(
                "LOGBRIDGE_ENABLE_CUSTOMIZED_COMMAND",
                get("LOGBRIDGE_ENABLE_CUSTOMIZED_COMMAND"),
                false,
            )?,
            enable_customized_command_from_message: parse_bool(
                "LOGBRIDGE_ENABLE_CUSTOMIZED_COMMAND_FROM_MESSAGE",
                get("LOGBRIDGE_ENABLE_CUSTOMIZED_COMMAND_FROM_MESSAGE"),
                false,
            )?,
            logseq_api_url,
            logseq_api_token,
            script_runtime,
            catalog_poll_interval: Duration::from_millis(catalog_poll_ms),
        })
    }

    /// Whether inbound messages go to today's journal page.
    pub fn uses_journal(&self) -> bool {
        self.page_name == DEFAULT_JOURNAL_PAGE
    }

    /// Whether `username` may use the bot.
    pub fn is_user_authorized(&self, username: Option<&str>) -> bool {
        if self.authorized_users.is_empty() {
            return true;
        }
        username
            .map(|name| self.authorized_users.iter().any(|u| u == name))
            .unwrap_or(false)
    }
}

/// Check a Telegram bot token's shape.
pub fn is_valid_bot_token(token: &str) -> bool {
    BOT_TOKEN_REGEX.is_match(token)
}

fn parse_user_list(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(',')
        .map(|u| u.trim().trim_start_matches('@').to_string())
        .filter(|u| !u.is_empty())
        .collect()
}

fn parse_bool(key: &'static str, raw: Option<String>, default: bool) -> Result<bool> {
    let Some(raw) = raw.filter(|v| !v.is_empty()) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(CoreError::InvalidSetting { key, value: raw }),
    }
}

fn parse_time(key: &'static str, raw: Option<String>) -> Result<Option<NaiveTime>> {
    let Some(raw) = raw.filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
        .map(Some)
        .map_err(|_| CoreError::InvalidSetting { key, value: raw })
}
