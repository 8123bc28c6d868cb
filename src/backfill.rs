use crate::config::EngineConfig;
use crate::error::Result;
use crate::ledger::CompletionLedger;
use crate::reconciler::Reconciler;
use crate::schema::{CompletionRecord, DateWindow, Obligation, ObligationRef};
use crate::utils::year_start;
use chrono::NaiveDate;
use log::{debug, info};
use std::collections::HashSet;

/// Materializes ledger records for every period between January 1 and a newly
/// chosen tracking start date.
pub struct Backfill<'a> {
    reconciler: Reconciler<'a>,
}

impl<'a> Backfill<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            reconciler: Reconciler::new(config),
        }
    }

    /// Every record a backfill to `new_tracking_start` would want to exist,
    /// ignoring what the ledger already holds.
    pub fn candidate_records(
        &self,
        user_id: &str,
        obligations: &[Obligation],
        new_tracking_start: NaiveDate,
    ) -> Vec<CompletionRecord> {
        let window = DateWindow::new(year_start(new_tracking_start), new_tracking_start);

        let mut records: Vec<CompletionRecord> = obligations
            .iter()
            .flat_map(|obligation| {
                let reference = obligation.reference();
                self.reconciler
                    .occurrences(obligation, window)
                    .into_iter()
                    .filter(move |date| *date < new_tracking_start)
                    .map(move |date| CompletionRecord::backfilled(user_id, reference.clone(), date))
            })
            .collect();

        records.sort_by(|a, b| {
            a.obligation
                .cmp(&b.obligation)
                .then_with(|| a.period_date.cmp(&b.period_date))
        });
        records.dedup_by(|a, b| a.obligation == b.obligation && a.period_date == b.period_date);
        records
    }

    /// Inserts the missing records and returns how many were added. Running it
    /// again with the same date adds nothing.
    pub fn run<L: CompletionLedger + ?Sized>(
        &self,
        ledger: &L,
        user_id: &str,
        obligations: &[Obligation],
        new_tracking_start: NaiveDate,
    ) -> Result<usize> {
        info!(
            "Backfilling {} obligation(s) for user {} up to {}",
            obligations.len(),
            user_id,
            new_tracking_start
        );

        let candidates = self.candidate_records(user_id, obligations, new_tracking_start);
        let Some(earliest) = candidates.iter().map(|r| r.period_date).min() else {
            info!("Nothing to backfill for user {}", user_id);
            return Ok(0);
        };
        let latest = candidates
            .iter()
            .map(|r| r.period_date)
            .max()
            .unwrap_or(earliest);

        let existing: HashSet<(ObligationRef, NaiveDate)> = ledger
            .find_in_range(user_id, earliest, latest)?
            .into_iter()
            .map(|r| (r.obligation, r.period_date))
            .collect();

        let missing: Vec<CompletionRecord> = candidates
            .into_iter()
            .filter(|r| !existing.contains(&(r.obligation.clone(), r.period_date)))
            .collect();
        debug!(
            "{} period(s) already recorded, {} to insert",
            existing.len(),
            missing.len()
        );

        // A concurrent backfill may have inserted some of these since the read;
        // insert_missing ignores them instead of duplicating.
        let inserted = if missing.is_empty() {
            0
        } else {
            ledger.insert_missing(&missing)?
        };

        info!(
            "Backfill for user {} inserted {} completion record(s)",
            user_id, inserted
        );
        Ok(inserted)
    }
}
