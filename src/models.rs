use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Direction of a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// POST records that have no remote id yet.
    #[serde(alias = "post")]
    Create,
    /// PATCH records that already carry a remote id.
    #[serde(alias = "patch")]
    Update,
}

impl SyncMode {
    pub fn method(&self) -> reqwest::Method {
        match self {
            Self::Create => reqwest::Method::POST,
            Self::Update => reqwest::Method::PATCH,
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Create => f.write_str("create"),
            Self::Update => f.write_str("update"),
        }
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "post" => Ok(Self::Create),
            "update" | "patch" => Ok(Self::Update),
            other => Err(format!("unknown sync mode '{other}' (expected create or update)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionType {
    Income,
    Expense,
    Other,
}

impl TransactionType {
    pub fn from_db(s: &str) -> Self {
        match s {
            "income" => Self::Income,
            "expense" => Self::Expense,
            _ => Self::Other,
        }
    }
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: i64,
    pub user_id: i64,
    pub txn_type: TransactionType,
    pub amount: f64,
    pub date_bank_processed: String,
    pub account_id: i64,
    pub category_id: Option<i64>,
    pub vendor_id: Option<i64>,
    pub description: String,
    pub notes: Option<String>,
    pub remote_id: Option<String>,
}

/// A transaction selected for sync, with its foreign keys already resolved
/// to the remote service's identifiers.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub transaction: Transaction,
    pub remote_account_id: String,
    pub remote_category_id: String,
    pub remote_vendor_id: Option<String>,
    pub vendor_name: Option<String>,
}
