use crate::error::{Result, TrackerError};
use crate::ledger::{CompletionLedger, LedgerKey};
use crate::schema::{CompletionRecord, ObligationRef};
use chrono::NaiveDate;
use log::{debug, info};
use std::fmt::Display;

/// User-facing writes to the completion ledger. Every operation is idempotent.
pub struct CompletionService<'a, L: CompletionLedger + ?Sized> {
    ledger: &'a L,
}

impl<'a, L: CompletionLedger + ?Sized> CompletionService<'a, L> {
    pub fn new(ledger: &'a L) -> Self {
        Self { ledger }
    }

    /// Records `period_date` as completed. Marking a period again replaces the
    /// completion date and link; a period before the tracking start gains a real
    /// record on top of its automatic completion.
    pub fn mark_complete(
        &self,
        user_id: &str,
        obligation: ObligationRef,
        period_date: NaiveDate,
        completed_date: NaiveDate,
        linked_transaction_id: Option<String>,
    ) -> Result<CompletionRecord> {
        debug!(
            "Marking {} period {} complete for user {}",
            obligation, period_date, user_id
        );
        self.ledger.upsert(CompletionRecord {
            user_id: user_id.to_string(),
            obligation,
            period_date,
            completed_date,
            linked_transaction_id,
        })
    }

    /// Removes the record for the period, if any. Returns whether one existed.
    ///
    /// Periods before the tracking start date stay completed regardless.
    pub fn unmark_complete(
        &self,
        user_id: &str,
        obligation: ObligationRef,
        period_date: NaiveDate,
    ) -> Result<bool> {
        let key = LedgerKey::new(user_id, obligation, period_date);
        let removed = self.ledger.delete(&key)?;
        if !removed {
            debug!(
                "No completion recorded for {} on {}; nothing to unmark",
                key.obligation, key.period_date
            );
        }
        Ok(removed)
    }

    /// Drops every completion linked to `transaction_id`.
    ///
    /// # Preconditions
    ///
    /// Call this before deleting the transaction itself. Afterwards the link may
    /// already be nulled by the store and the completions can no longer be found.
    pub fn remove_by_linked_transaction(&self, transaction_id: &str) -> Result<usize> {
        let removed = self.ledger.delete_by_linked_transaction(transaction_id)?;
        info!(
            "Removed {} completion(s) linked to transaction {}",
            removed, transaction_id
        );
        Ok(removed)
    }

    /// Runs the two-step transaction removal in the required order: ledger
    /// cleanup first, then the caller's `delete_transaction`.
    ///
    /// If `delete_transaction` fails, the completions are already gone; retrying
    /// the whole call is safe since both steps are idempotent.
    pub fn remove_transaction_with<F, E>(
        &self,
        transaction_id: &str,
        delete_transaction: F,
    ) -> Result<usize>
    where
        F: FnOnce(&str) -> std::result::Result<(), E>,
        E: Display,
    {
        let removed = self.remove_by_linked_transaction(transaction_id)?;
        delete_transaction(transaction_id).map_err(|e| {
            TrackerError::Collaborator(format!(
                "deleting transaction {} failed: {}",
                transaction_id, e
            ))
        })?;
        Ok(removed)
    }
}
