use rusqlite::Connection;
use tracing::{debug, error, info, warn};

use crate::client::LedgerApi;
use crate::error::Result;
use crate::filter::RecordFilter;
use crate::mapper::{build_batch, Batch};
use crate::models::SyncMode;
use crate::reconciler::{self, ReconcileResult};
use crate::settings::SyncConfig;

/// Counters for one sync pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub records_considered: usize,
    pub records_sent: usize,
    pub records_skipped: usize,
    pub requests: usize,
    pub failed_batches: usize,
    pub reconciled: usize,
    pub reconcile_failures: usize,
    pub unmatched: usize,
    /// Records sent in a create batch that the response never accounted for.
    pub missing: usize,
}

impl RunSummary {
    fn absorb(&mut self, result: ReconcileResult) {
        self.reconciled += result.reconciled;
        self.reconcile_failures += result.failed;
        self.unmatched += result.unmatched;
        self.missing += result.missing;
    }
}

fn log_batch(batch: &Batch, summary: &RunSummary) {
    let first = summary.records_considered - batch.entries.len() - batch.skipped.len();
    for (n, entry) in batch.entries.iter().enumerate() {
        debug!(
            "[{}] adding {}::{}::{} ({})",
            first + n + 1,
            entry.local_id,
            entry.payload.account_id,
            entry.payload.category_id,
            entry.payload.date
        );
    }
    for (local_id, reason) in &batch.skipped {
        info!(local_id, %reason, "skipping transaction");
    }
}

/// Run one full pass: page through matching records, push each page as a
/// single request, and write remote ids back after successful creates.
///
/// A failed request is logged and the pass moves on to the next page, as is
/// a row that cannot be decoded. Only a failing store query ends the run
/// early.
pub fn run(conn: &Connection, api: &dyn LedgerApi, config: &SyncConfig) -> Result<RunSummary> {
    let filter = RecordFilter::new(config.user_id, config.mode, &config.filters);
    let pending = filter.count(conn)?;
    info!(
        mode = %config.mode,
        pending,
        chunk_size = config.chunk_size,
        "starting sync"
    );

    let mut summary = RunSummary::default();
    let mut cursor = filter.chunks(conn, config.chunk_size);
    let mut throttle = false;

    loop {
        if throttle && !config.delay.is_zero() {
            debug!(delay = ?config.delay, "throttling before next batch");
            std::thread::sleep(config.delay);
        }
        throttle = false;

        let Some(chunk) = cursor.next() else {
            break;
        };
        let chunk = chunk?;
        summary.records_considered += chunk.len();

        let batch = build_batch(&chunk);
        summary.records_skipped += batch.skipped.len();
        log_batch(&batch, &summary);

        if batch.is_empty() {
            warn!(records = chunk.len(), "no eligible records in page, nothing to send");
            continue;
        }

        info!(count = batch.entries.len(), "posting transactions");
        summary.requests += 1;
        throttle = true;

        // Scoped to this iteration: a failed request has no response to
        // reconcile against.
        let response = match api.push(config.mode, &batch.payloads()) {
            Ok(response) => response,
            Err(e) => {
                error!(request = summary.requests, error = %e, "batch request failed");
                summary.failed_batches += 1;
                continue;
            }
        };

        summary.records_sent += batch.entries.len();
        info!("[{}] posted {} transactions", summary.requests, batch.entries.len());
        if let Some(message) = response.result_message() {
            info!(result = %message, "ledger result");
        }

        if config.mode == SyncMode::Create {
            summary.absorb(reconciler::reconcile(conn, &batch, &response));
        }
    }

    info!(
        considered = summary.records_considered,
        sent = summary.records_sent,
        requests = summary.requests,
        failed = summary.failed_batches,
        linked = summary.reconciled,
        missing = summary.missing,
        "sync finished"
    );
    Ok(summary)
}
