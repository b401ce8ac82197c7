pub mod sync;

use clap::Parser;

use crate::models::SyncMode;
use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(
    name = "syncup",
    version,
    about = "Push local transactions to the remote ledger, creating or updating them in batches."
)]
pub struct Cli {
    /// Settings file (default: ~/.config/syncup/settings.json)
    #[arg(long)]
    pub config: Option<String>,
    /// Sync direction: create new remote records or update linked ones
    #[arg(long, value_enum)]
    pub mode: Option<SyncMode>,
    /// Owner whose transactions are synced
    #[arg(long = "user")]
    pub user_id: Option<i64>,
    /// Only sync transactions processed before this date: YYYY-MM-DD
    #[arg(long)]
    pub until: Option<String>,
    /// Restrict to a local category id (repeatable)
    #[arg(long = "category")]
    pub category_ids: Vec<i64>,
    /// Restrict to a local vendor id (repeatable)
    #[arg(long = "vendor")]
    pub vendor_ids: Vec<i64>,
    /// Restrict to a local account id (repeatable)
    #[arg(long = "account")]
    pub account_ids: Vec<i64>,
    /// Records per request
    #[arg(long = "chunk-size")]
    pub chunk_size: Option<usize>,
    /// Seconds to wait between requests
    #[arg(long = "delay")]
    pub delay_secs: Option<u64>,
    /// Directory holding ledger.db
    #[arg(long = "data-dir")]
    pub data_dir: Option<String>,
}

impl Cli {
    /// Flags take precedence over the settings file and environment.
    pub fn apply(&self, settings: &mut Settings) {
        if let Some(mode) = self.mode {
            settings.mode = Some(mode);
        }
        if let Some(user) = self.user_id {
            settings.user_id = Some(user);
        }
        if let Some(until) = &self.until {
            settings.until = Some(until.clone());
        }
        if !self.category_ids.is_empty() {
            settings.category_ids = self.category_ids.clone();
        }
        if !self.vendor_ids.is_empty() {
            settings.vendor_ids = self.vendor_ids.clone();
        }
        if !self.account_ids.is_empty() {
            settings.account_ids = self.account_ids.clone();
        }
        if let Some(size) = self.chunk_size {
            settings.chunk_size = size;
        }
        if let Some(delay) = self.delay_secs {
            settings.delay_secs = delay;
        }
        if let Some(dir) = &self.data_dir {
            settings.data_dir = dir.clone();
        }
    }
}
