use std::collections::{HashMap, HashSet};

use rusqlite::Connection;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::client::SyncResponse;
use crate::error::{Result, SyncError};
use crate::mapper::Batch;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileResult {
    pub reconciled: usize,
    pub failed: usize,
    /// Response entries that could not be tied to a sent record.
    pub unmatched: usize,
    /// Sent records that no response entry was tied to.
    pub missing: usize,
}

struct Correlation<'r> {
    pairs: Vec<(i64, &'r Value)>,
    unmatched: usize,
    missing: usize,
}

/// Ids may come back as JSON strings or numbers.
fn json_id(value: &Value, key: &str) -> Option<String> {
    match value.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Pair response entries with the local records that produced them.
///
/// Entries are matched on the `external_id` the mapper attached. When the
/// ledger echoes no keys at all, a response of exactly the batch's length is
/// matched by position. Entries that cannot be paired are unmatched; sent
/// records left without an entry are missing.
fn correlate<'r>(batch: &Batch, entries: &'r [Value]) -> Correlation<'r> {
    let keyed = entries.iter().any(|e| json_id(e, "external_id").is_some());

    if !keyed {
        if entries.len() == batch.entries.len() {
            let pairs = batch
                .entries
                .iter()
                .map(|e| e.local_id)
                .zip(entries.iter())
                .collect();
            return Correlation {
                pairs,
                unmatched: 0,
                missing: 0,
            };
        }
        error!(
            sent = batch.entries.len(),
            returned = entries.len(),
            "response carries no external ids and its length differs from the batch"
        );
        return Correlation {
            pairs: Vec::new(),
            unmatched: entries.len(),
            missing: batch.entries.len(),
        };
    }

    let by_key: HashMap<String, i64> = batch
        .entries
        .iter()
        .map(|e| (e.payload.external_id.clone(), e.local_id))
        .collect();

    let mut pairs = Vec::with_capacity(entries.len());
    let mut unmatched = 0usize;
    for entry in entries {
        match json_id(entry, "external_id").and_then(|k| by_key.get(&k).copied()) {
            Some(local_id) => pairs.push((local_id, entry)),
            None => {
                error!(remote_id = ?json_id(entry, "id"), "response entry matches no record in this batch");
                unmatched += 1;
            }
        }
    }

    let paired: HashSet<i64> = pairs.iter().map(|(local_id, _)| *local_id).collect();
    let mut missing = 0usize;
    for entry in batch.entries.iter().filter(|e| !paired.contains(&e.local_id)) {
        error!(local_id = entry.local_id, "sent record is absent from the response");
        missing += 1;
    }

    Correlation {
        pairs,
        unmatched,
        missing,
    }
}

fn save_remote(conn: &Connection, local_id: i64, entry: &Value) -> Result<String> {
    let remote_id = json_id(entry, "id")
        .ok_or_else(|| SyncError::Reconcile(format!("response for transaction {local_id} has no id")))?;
    let snapshot = serde_json::to_string(entry)?;

    let changed = conn.execute(
        "UPDATE transactions SET remote_id = ?1, remote_snapshot = ?2 \
         WHERE id = ?3 AND remote_id IS NULL",
        rusqlite::params![remote_id, snapshot, local_id],
    )?;
    if changed == 0 {
        return Err(SyncError::Reconcile(format!(
            "transaction {local_id} is missing or already linked"
        )));
    }
    Ok(remote_id)
}

/// Write remote ids and snapshots from a successful create response back
/// onto the local records. Per-record failures are logged and counted.
pub fn reconcile(conn: &Connection, batch: &Batch, response: &SyncResponse) -> ReconcileResult {
    let Correlation {
        pairs,
        unmatched,
        missing,
    } = correlate(batch, &response.data.transactions);
    let mut result = ReconcileResult {
        unmatched,
        missing,
        ..Default::default()
    };

    for (local_id, entry) in pairs {
        match save_remote(conn, local_id, entry) {
            Ok(remote_id) => {
                debug!(local_id, %remote_id, "saved remote transaction");
                result.reconciled += 1;
            }
            Err(e) => {
                warn!(local_id, error = %e, "could not save remote transaction");
                result.failed += 1;
            }
        }
    }
    result
}
