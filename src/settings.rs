use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use zeroize::Zeroizing;

use crate::error::{Result, SyncError};
use crate::filter::FilterOptions;
use crate::models::SyncMode;

pub const DEFAULT_API_BASE: &str = "https://dev.lunchmoney.app/v1/transactions";
pub const DB_FILE: &str = "ledger.db";

/// Raw, partially-filled configuration as read from disk and environment.
/// Validated into a [`SyncConfig`] before a run starts.
#[derive(Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_data_dir_string")]
    pub data_dir: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub mode: Option<SyncMode>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,
    #[serde(default)]
    pub until: Option<String>,
    #[serde(default)]
    pub category_ids: Vec<i64>,
    #[serde(default)]
    pub vendor_ids: Vec<i64>,
    #[serde(default)]
    pub account_ids: Vec<i64>,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_delay_secs() -> u64 {
    5
}

fn default_data_dir_string() -> String {
    default_data_dir().to_string_lossy().to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir_string(),
            api_base: default_api_base(),
            mode: None,
            user_id: None,
            account_id: None,
            access_token: None,
            chunk_size: default_chunk_size(),
            delay_secs: default_delay_secs(),
            until: None,
            category_ids: Vec::new(),
            vendor_ids: Vec::new(),
            account_ids: Vec::new(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("syncup")
}

pub fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Documents")
        .join("syncup")
}

/// Read settings from `path`. A missing file yields defaults; a malformed
/// one is an error.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| SyncError::Settings(format!("{}: {e}", path.display())))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl Settings {
    /// Overlay values from the environment. `lookup` is `std::env::var` in
    /// production.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |keys: &[&str]| keys.iter().find_map(|k| non_empty(lookup(*k)));

        if let Some(token) = first(&["SYNCUP_ACCESS_TOKEN", "ACCESS_TOKEN"]) {
            self.access_token = Some(token);
        }
        if let Some(account) = first(&["SYNCUP_ACCOUNT_ID", "ACCOUNT_ID"]) {
            self.account_id = Some(account);
        }
        if let Some(base) = first(&["SYNCUP_API_BASE"]) {
            self.api_base = base;
        }
        if let Some(mode) = first(&["SYNCUP_MODE"]) {
            self.mode = Some(mode.parse().map_err(SyncError::InvalidConfig)?);
        }
        if let Some(user) = first(&["SYNCUP_USER_ID"]) {
            let id = user
                .parse()
                .map_err(|_| SyncError::InvalidConfig(format!("SYNCUP_USER_ID is not a number: {user}")))?;
            self.user_id = Some(id);
        }
        Ok(())
    }
}

/// Validated configuration for one sync pass.
pub struct SyncConfig {
    pub mode: SyncMode,
    pub user_id: i64,
    pub api_base: String,
    pub account_id: String,
    pub access_token: Zeroizing<String>,
    pub chunk_size: usize,
    pub delay: Duration,
    pub filters: FilterOptions,
    pub db_path: PathBuf,
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("mode", &self.mode)
            .field("user_id", &self.user_id)
            .field("api_base", &self.api_base)
            .field("account_id", &self.account_id)
            .field("access_token", &"<redacted>")
            .field("chunk_size", &self.chunk_size)
            .field("delay", &self.delay)
            .field("filters", &self.filters)
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl SyncConfig {
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let mode = settings.mode.ok_or(SyncError::MissingConfig("mode"))?;
        let user_id = settings.user_id.ok_or(SyncError::MissingConfig("user_id"))?;
        let account_id =
            non_empty(settings.account_id).ok_or(SyncError::MissingConfig("account_id"))?;
        let access_token =
            non_empty(settings.access_token).ok_or(SyncError::MissingConfig("access_token"))?;

        if settings.chunk_size == 0 {
            return Err(SyncError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if non_empty(Some(settings.api_base.clone())).is_none() {
            return Err(SyncError::InvalidConfig("api_base is empty".to_string()));
        }

        let until = match non_empty(settings.until) {
            Some(raw) => Some(NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| {
                SyncError::InvalidConfig(format!("until must be YYYY-MM-DD, got '{raw}'"))
            })?),
            None => None,
        };

        Ok(Self {
            mode,
            user_id,
            api_base: settings.api_base,
            account_id,
            access_token: Zeroizing::new(access_token),
            chunk_size: settings.chunk_size,
            delay: Duration::from_secs(settings.delay_secs),
            filters: FilterOptions {
                until,
                category_ids: settings.category_ids,
                vendor_ids: settings.vendor_ids,
                account_ids: settings.account_ids,
            },
            db_path: PathBuf::from(expand_home(&settings.data_dir)).join(DB_FILE),
        })
    }
}

pub fn expand_home(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}
