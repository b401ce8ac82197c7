use std::path::PathBuf;

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::Cli;
use crate::client::HttpLedgerClient;
use crate::db::get_connection;
use crate::error::{Result, SyncError};
use crate::settings::{load_settings, settings_path, SyncConfig};
use crate::sync::{self, RunSummary};

/// Resolve configuration from file, environment and flags, in that order.
/// Fails before touching the store or the network if anything is missing.
pub fn resolve_config(cli: &Cli) -> Result<SyncConfig> {
    let path = cli.config.as_ref().map(PathBuf::from).unwrap_or_else(settings_path);
    let mut settings = load_settings(&path)?;
    settings.apply_env(|key| std::env::var(key).ok())?;
    cli.apply(&mut settings);
    SyncConfig::from_settings(settings)
}

pub fn run(cli: &Cli) -> Result<()> {
    let config = resolve_config(cli)?;

    if !config.db_path.exists() {
        return Err(SyncError::Settings(format!(
            "database not found at {}",
            config.db_path.display()
        )));
    }
    let conn = get_connection(&config.db_path)?;
    let client = HttpLedgerClient::new(
        &config.api_base,
        &config.account_id,
        config.access_token.clone(),
    )?;

    let summary = sync::run(&conn, &client, &config)?;
    println!("{}", format_summary(&config, &summary));
    Ok(())
}

pub fn format_summary(config: &SyncConfig, s: &RunSummary) -> String {
    let mut table = Table::new();
    table.set_header(vec!["", "Count"]);
    table.add_row(vec![Cell::new("Records considered"), Cell::new(s.records_considered)]);
    table.add_row(vec![Cell::new("Records sent"), Cell::new(s.records_sent)]);
    table.add_row(vec![Cell::new("Records skipped"), Cell::new(s.records_skipped)]);
    table.add_row(vec![Cell::new("Requests"), Cell::new(s.requests)]);
    table.add_row(vec![Cell::new("Failed requests"), Cell::new(s.failed_batches)]);
    if s.reconciled + s.reconcile_failures + s.unmatched + s.missing > 0 {
        table.add_row(vec![Cell::new("Linked"), Cell::new(s.reconciled)]);
        table.add_row(vec![Cell::new("Link failures"), Cell::new(s.reconcile_failures)]);
        table.add_row(vec![Cell::new("Unmatched responses"), Cell::new(s.unmatched)]);
        table.add_row(vec![Cell::new("Missing from response"), Cell::new(s.missing)]);
    }

    let heading = format!("Sync ({})", config.mode);
    let clean = s.failed_batches == 0
        && s.reconcile_failures == 0
        && s.unmatched == 0
        && s.missing == 0;
    let heading = if clean {
        heading.green().bold()
    } else {
        heading.yellow().bold()
    };
    format!("{heading}\n{table}")
}
