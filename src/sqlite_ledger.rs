//! Completion ledger stored in SQLite.
//!
//! The unique constraint on `(user_id, obligation_source, obligation_id, period_date)`
//! is what keeps racing writers from duplicating a period: `upsert` resolves
//! through `ON CONFLICT`, backfills through `INSERT OR IGNORE`.

use crate::error::{Result, TrackerError};
use crate::ledger::{CompletionLedger, LedgerKey};
use crate::schema::{CompletionRecord, ObligationRef};
use chrono::NaiveDate;
use log::debug;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS period_completions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    obligation_source TEXT NOT NULL CHECK (obligation_source IN ('recurring', 'debt')),
    obligation_id TEXT NOT NULL,
    period_date TEXT NOT NULL,
    completed_date TEXT NOT NULL,
    linked_transaction_id TEXT,
    UNIQUE (user_id, obligation_source, obligation_id, period_date)
);
CREATE INDEX IF NOT EXISTS idx_period_completions_user_period
    ON period_completions (user_id, period_date);
CREATE INDEX IF NOT EXISTS idx_period_completions_linked_tx
    ON period_completions (linked_transaction_id);
";

const SELECT_COLUMNS: &str = "SELECT user_id, obligation_source, obligation_id, period_date, \
     completed_date, linked_transaction_id FROM period_completions";

/// Holds the connection behind a `Mutex`; `rusqlite::Connection` is not `Sync`.
pub struct SqliteLedger {
    conn: Mutex<Connection>,
}

impl SqliteLedger {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wraps an existing connection and creates the table if it is missing.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TrackerError::Ledger("sqlite connection lock poisoned".to_string()))
    }

    fn find_with(conn: &Connection, key: &LedgerKey) -> Result<Option<CompletionRecord>> {
        let sql = format!(
            "{} WHERE user_id = ?1 AND obligation_source = ?2 AND obligation_id = ?3 AND period_date = ?4",
            SELECT_COLUMNS
        );
        let record = conn
            .query_row(
                &sql,
                params![
                    key.user_id,
                    key.obligation.source(),
                    key.obligation.id(),
                    key.period_date
                ],
                map_record,
            )
            .optional()?;
        Ok(record)
    }
}

fn map_record(row: &Row<'_>) -> rusqlite::Result<CompletionRecord> {
    let source: String = row.get(1)?;
    let id: String = row.get(2)?;
    let obligation = ObligationRef::from_parts(&source, id).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("unknown obligation source '{}'", source).into(),
        )
    })?;

    Ok(CompletionRecord {
        user_id: row.get(0)?,
        obligation,
        period_date: row.get(3)?,
        completed_date: row.get(4)?,
        linked_transaction_id: row.get(5)?,
    })
}

impl CompletionLedger for SqliteLedger {
    fn find(&self, key: &LedgerKey) -> Result<Option<CompletionRecord>> {
        let conn = self.lock()?;
        Self::find_with(&conn, key)
    }

    fn find_in_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompletionRecord>> {
        let conn = self.lock()?;
        let sql = format!(
            "{} WHERE user_id = ?1 AND period_date >= ?2 AND period_date <= ?3 \
             ORDER BY period_date, obligation_source, obligation_id",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, start, end], map_record)?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn upsert(&self, record: CompletionRecord) -> Result<CompletionRecord> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO period_completions (
                user_id, obligation_source, obligation_id, period_date,
                completed_date, linked_transaction_id
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (user_id, obligation_source, obligation_id, period_date) DO UPDATE SET
                completed_date = excluded.completed_date,
                linked_transaction_id = excluded.linked_transaction_id",
            params![
                record.user_id,
                record.obligation.source(),
                record.obligation.id(),
                record.period_date,
                record.completed_date,
                record.linked_transaction_id,
            ],
        )?;

        let key = LedgerKey::from(&record);
        Self::find_with(&conn, &key)?.ok_or_else(|| {
            TrackerError::Ledger(format!(
                "completion for {} on {} vanished after upsert",
                key.obligation, key.period_date
            ))
        })
    }

    fn insert_missing(&self, records: &[CompletionRecord]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO period_completions (
                    user_id, obligation_source, obligation_id, period_date,
                    completed_date, linked_transaction_id
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for record in records {
                inserted += stmt.execute(params![
                    record.user_id,
                    record.obligation.source(),
                    record.obligation.id(),
                    record.period_date,
                    record.completed_date,
                    record.linked_transaction_id,
                ])?;
            }
        }
        tx.commit()?;

        debug!(
            "Inserted {} of {} candidate completion record(s)",
            inserted,
            records.len()
        );
        Ok(inserted)
    }

    fn delete(&self, key: &LedgerKey) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM period_completions
             WHERE user_id = ?1 AND obligation_source = ?2 AND obligation_id = ?3 AND period_date = ?4",
            params![
                key.user_id,
                key.obligation.source(),
                key.obligation.id(),
                key.period_date
            ],
        )?;
        Ok(removed > 0)
    }

    fn delete_by_linked_transaction(&self, transaction_id: &str) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM period_completions WHERE linked_transaction_id = ?1",
            params![transaction_id],
        )?;
        Ok(removed)
    }
}
