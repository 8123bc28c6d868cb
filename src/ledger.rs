use crate::error::{Result, TrackerError};
use crate::schema::{CompletionRecord, ObligationRef};
use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Unique key of a completion record. At most one record exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LedgerKey {
    pub user_id: String,
    pub obligation: ObligationRef,
    pub period_date: NaiveDate,
}

impl LedgerKey {
    pub fn new(
        user_id: impl Into<String>,
        obligation: ObligationRef,
        period_date: NaiveDate,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            obligation,
            period_date,
        }
    }
}

impl From<&CompletionRecord> for LedgerKey {
    fn from(record: &CompletionRecord) -> Self {
        Self::new(record.user_id.clone(), record.obligation.clone(), record.period_date)
    }
}

/// Persisted completion facts.
///
/// `upsert` is the only path that can change an existing record, and it must be
/// atomic per key so concurrent writers converge on a single row.
pub trait CompletionLedger: Send + Sync {
    fn find(&self, key: &LedgerKey) -> Result<Option<CompletionRecord>>;

    /// All of a user's records with `start <= period_date <= end`, ordered by period date.
    fn find_in_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompletionRecord>>;

    /// Inserts the record, or overwrites `completed_date` and
    /// `linked_transaction_id` of the record already stored under its key.
    fn upsert(&self, record: CompletionRecord) -> Result<CompletionRecord>;

    /// Inserts every record whose key is not present yet and leaves existing
    /// ones untouched. Returns the number of rows actually inserted.
    fn insert_missing(&self, records: &[CompletionRecord]) -> Result<usize>;

    /// Returns whether a record was removed.
    fn delete(&self, key: &LedgerKey) -> Result<bool>;

    /// Removes every record linked to `transaction_id` and returns how many went.
    ///
    /// Must run before the transaction itself is deleted: once it is gone a
    /// cascading `SET NULL` can clear the link and leave the completion orphaned.
    fn delete_by_linked_transaction(&self, transaction_id: &str) -> Result<usize>;
}

#[derive(Debug, Default)]
pub struct InMemoryLedger {
    records: RwLock<BTreeMap<LedgerKey, CompletionRecord>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<LedgerKey, CompletionRecord>>> {
        self.records
            .read()
            .map_err(|_| TrackerError::Ledger("completion ledger lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<LedgerKey, CompletionRecord>>> {
        self.records
            .write()
            .map_err(|_| TrackerError::Ledger("completion ledger lock poisoned".to_string()))
    }
}

impl CompletionLedger for InMemoryLedger {
    fn find(&self, key: &LedgerKey) -> Result<Option<CompletionRecord>> {
        Ok(self.read()?.get(key).cloned())
    }

    fn find_in_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<CompletionRecord>> {
        let records = self.read()?;
        let mut found: Vec<CompletionRecord> = records
            .values()
            .filter(|r| r.user_id == user_id && start <= r.period_date && r.period_date <= end)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            a.period_date
                .cmp(&b.period_date)
                .then_with(|| a.obligation.cmp(&b.obligation))
        });
        Ok(found)
    }

    fn upsert(&self, record: CompletionRecord) -> Result<CompletionRecord> {
        let mut records = self.write()?;
        let key = LedgerKey::from(&record);
        let stored = records
            .entry(key)
            .and_modify(|existing| {
                existing.completed_date = record.completed_date;
                existing.linked_transaction_id = record.linked_transaction_id.clone();
            })
            .or_insert_with(|| record.clone())
            .clone();
        Ok(stored)
    }

    fn insert_missing(&self, records: &[CompletionRecord]) -> Result<usize> {
        let mut stored = self.write()?;
        let mut inserted = 0;
        for record in records {
            let key = LedgerKey::from(record);
            if !stored.contains_key(&key) {
                stored.insert(key, record.clone());
                inserted += 1;
            }
        }
        debug!(
            "Inserted {} of {} candidate completion record(s)",
            inserted,
            records.len()
        );
        Ok(inserted)
    }

    fn delete(&self, key: &LedgerKey) -> Result<bool> {
        Ok(self.write()?.remove(key).is_some())
    }

    fn delete_by_linked_transaction(&self, transaction_id: &str) -> Result<usize> {
        let mut records = self.write()?;
        let before = records.len();
        records.retain(|_, r| r.linked_transaction_id.as_deref() != Some(transaction_id));
        Ok(before - records.len())
    }
}
