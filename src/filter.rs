use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use tracing::warn;

use crate::error::Result;
use crate::models::{Candidate, SyncMode, Transaction, TransactionType};

/// Optional narrowing of a sync pass. Empty sets mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterOptions {
    /// Only records processed strictly before this date.
    pub until: Option<NaiveDate>,
    pub category_ids: Vec<i64>,
    pub vendor_ids: Vec<i64>,
    pub account_ids: Vec<i64>,
}

const SELECT_CANDIDATES: &str = "\
SELECT t.id, t.user_id, t.type, t.amount, t.date_bank_processed, t.account_id, \
       t.category_id, t.vendor_id, t.description, t.notes, t.remote_id, \
       a.remote_id, c.remote_id, v.remote_id, v.name \
FROM transactions t \
LEFT JOIN accounts a ON a.id = t.account_id \
LEFT JOIN categories c ON c.id = t.category_id \
LEFT JOIN vendors v ON v.id = t.vendor_id";

/// Selection predicate over the transactions table.
#[derive(Debug, Clone)]
pub struct RecordFilter {
    clauses: Vec<String>,
    params: Vec<Value>,
}

impl RecordFilter {
    pub fn new(user_id: i64, mode: SyncMode, options: &FilterOptions) -> Self {
        let mut clauses = vec![
            "t.user_id = ?".to_string(),
            "t.type IN ('income', 'expense')".to_string(),
        ];
        let mut params = vec![Value::Integer(user_id)];

        clauses.push(match mode {
            SyncMode::Update => "t.remote_id IS NOT NULL".to_string(),
            SyncMode::Create => "t.remote_id IS NULL".to_string(),
        });

        if let Some(until) = options.until {
            clauses.push("t.date_bank_processed < ?".to_string());
            params.push(Value::Text(until.format("%Y-%m-%d").to_string()));
        }
        for (column, ids) in [
            ("t.category_id", &options.category_ids),
            ("t.vendor_id", &options.vendor_ids),
            ("t.account_id", &options.account_ids),
        ] {
            if !ids.is_empty() {
                clauses.push(in_clause(column, ids.len()));
                params.extend(ids.iter().map(|id| Value::Integer(*id)));
            }
        }

        Self { clauses, params }
    }

    /// Lazily page through matching records, oldest first, `chunk_size` rows
    /// per page. Each call to `next()` issues one query.
    pub fn chunks(self, conn: &Connection, chunk_size: usize) -> ChunkCursor<'_> {
        ChunkCursor {
            conn,
            filter: self,
            chunk_size: chunk_size.max(1),
            after: None,
            exhausted: false,
        }
    }

    /// Number of records currently matching the predicate.
    pub fn count(&self, conn: &Connection) -> Result<i64> {
        let sql = format!(
            "SELECT count(*) FROM transactions t WHERE {}",
            self.clauses.join(" AND ")
        );
        Ok(conn.query_row(&sql, params_from_iter(self.params.iter()), |r| r.get(0))?)
    }
}

fn in_clause(column: &str, n: usize) -> String {
    let placeholders = vec!["?"; n].join(", ");
    format!("{column} IN ({placeholders})")
}

/// Forward-only cursor over chunks of candidates.
///
/// Pages are keyed on the last `(date_bank_processed, id)` seen rather than
/// an offset, so rows that stop matching mid-run (a create pass writes
/// `remote_id`) do not shift the next page. Once exhausted it stays
/// exhausted; build a new filter to start over.
///
/// A row that cannot be decoded is logged and left out of its page without
/// stalling the cursor. A failing query is returned as an error.
pub struct ChunkCursor<'c> {
    conn: &'c Connection,
    filter: RecordFilter,
    chunk_size: usize,
    after: Option<(String, i64)>,
    exhausted: bool,
}

struct Page {
    candidates: Vec<Candidate>,
    rows: usize,
    last: Option<(String, i64)>,
}

impl ChunkCursor<'_> {
    fn fetch(&self) -> Result<Page> {
        let mut sql = format!(
            "{SELECT_CANDIDATES} WHERE {}",
            self.filter.clauses.join(" AND ")
        );
        let mut params = self.filter.params.clone();

        if let Some((date, id)) = &self.after {
            sql.push_str(
                " AND (t.date_bank_processed > ? OR (t.date_bank_processed = ? AND t.id > ?))",
            );
            params.push(Value::Text(date.clone()));
            params.push(Value::Text(date.clone()));
            params.push(Value::Integer(*id));
        }
        sql.push_str(" ORDER BY t.date_bank_processed ASC, t.id ASC LIMIT ?");
        params.push(Value::Integer(i64::try_from(self.chunk_size).unwrap_or(i64::MAX)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(params.iter()))?;
        let mut page = Page {
            candidates: Vec::new(),
            rows: 0,
            last: None,
        };
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let date: String = row.get(4)?;
            page.rows += 1;
            match candidate_from_row(row) {
                Ok(candidate) => page.candidates.push(candidate),
                Err(e) => warn!(id, error = %e, "skipping unreadable transaction"),
            }
            page.last = Some((date, id));
        }
        Ok(page)
    }
}

impl Iterator for ChunkCursor<'_> {
    type Item = Result<Vec<Candidate>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }
        let page = match self.fetch() {
            Ok(page) => page,
            Err(e) => {
                self.exhausted = true;
                return Some(Err(e));
            }
        };
        if page.rows < self.chunk_size {
            self.exhausted = true;
        }
        self.after = Some(page.last?);
        Some(Ok(page.candidates))
    }
}

fn candidate_from_row(row: &Row) -> rusqlite::Result<Candidate> {
    let txn_type: String = row.get(2)?;
    Ok(Candidate {
        transaction: Transaction {
            id: row.get(0)?,
            user_id: row.get(1)?,
            txn_type: TransactionType::from_db(&txn_type),
            amount: row.get(3)?,
            date_bank_processed: row.get(4)?,
            account_id: row.get(5)?,
            category_id: row.get(6)?,
            vendor_id: row.get(7)?,
            description: row.get(8)?,
            notes: row.get(9)?,
            remote_id: row.get(10)?,
        },
        remote_account_id: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
        remote_category_id: row.get::<_, Option<String>>(12)?.unwrap_or_default(),
        remote_vendor_id: row.get(13)?,
        vendor_name: row.get(14)?,
    })
}
