use std::fmt;

use serde::Serialize;

use crate::models::Candidate;

/// Remote identifiers shorter than this are treated as placeholders rather
/// than real ledger ids. Heuristic business rule; confirm with the ledger
/// owner before tightening it.
pub const MIN_REMOTE_ID_LEN: usize = 6;

/// One entry of the `transactions` array sent to the remote ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub date: String,
    pub amount: f64,
    pub account_id: String,
    pub category_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Local id, echoed back by the ledger so responses can be matched.
    pub external_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    ZeroAmount,
    AccountId,
    CategoryId,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroAmount => f.write_str("zero amount"),
            Self::AccountId => f.write_str("remote account id looks like a placeholder"),
            Self::CategoryId => f.write_str("remote category id looks like a placeholder"),
        }
    }
}

fn looks_remote(id: &str) -> bool {
    id.chars().count() >= MIN_REMOTE_ID_LEN
}

pub fn map_transaction(candidate: &Candidate) -> Result<RemoteTransaction, SkipReason> {
    let txn = &candidate.transaction;
    if txn.amount == 0.0 {
        return Err(SkipReason::ZeroAmount);
    }
    if !looks_remote(&candidate.remote_account_id) {
        return Err(SkipReason::AccountId);
    }
    if !looks_remote(&candidate.remote_category_id) {
        return Err(SkipReason::CategoryId);
    }

    let payee = candidate
        .vendor_name
        .clone()
        .or_else(|| Some(txn.description.clone()).filter(|d| !d.is_empty()));

    Ok(RemoteTransaction {
        id: txn.remote_id.clone(),
        date: txn.date_bank_processed.clone(),
        amount: txn.amount,
        account_id: candidate.remote_account_id.clone(),
        category_id: candidate.remote_category_id.clone(),
        vendor_id: candidate.remote_vendor_id.clone(),
        payee,
        notes: txn.notes.clone(),
        external_id: txn.id.to_string(),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub local_id: i64,
    pub payload: RemoteTransaction,
}

/// Mapped records for one request, in the same relative order as the
/// candidates they came from.
#[derive(Debug, Default)]
pub struct Batch {
    pub entries: Vec<BatchEntry>,
    pub skipped: Vec<(i64, SkipReason)>,
}

impl Batch {
    pub fn payloads(&self) -> Vec<RemoteTransaction> {
        self.entries.iter().map(|e| e.payload.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn build_batch(chunk: &[Candidate]) -> Batch {
    let mut batch = Batch::default();
    for candidate in chunk {
        match map_transaction(candidate) {
            Ok(payload) => batch.entries.push(BatchEntry {
                local_id: candidate.transaction.id,
                payload,
            }),
            Err(reason) => batch.skipped.push((candidate.transaction.id, reason)),
        }
    }
    batch
}
