//! # Obligation Tracker
//!
//! A library for expanding recurring financial obligations (income, fixed
//! expenses, subscriptions, debt payments) into concrete due periods and
//! reconciling them against a persisted completion ledger.
//!
//! ## Core Concepts
//!
//! - **Obligation**: A recurring item with a frequency rule, from either a generic
//!   recurring table or a debt account
//! - **Period**: One calendar date on which an obligation falls due, derived on demand
//! - **Completion Ledger**: Persisted facts recording which periods were fulfilled,
//!   unique per `(user, obligation, period date)`
//! - **Tracking Start Date**: A user-chosen cutoff; every period before it counts as
//!   completed ("auto-completed") without needing a ledger record
//! - **Backfill**: Materializes ledger records for the periods between January 1 and a
//!   newly chosen tracking start date
//!
//! ## Example
//!
//! ```rust,ignore
//! use obligation_tracker::*;
//! use chrono::NaiveDate;
//!
//! let tracker = ObligationTracker::new(EngineConfig::default(), InMemoryLedger::new())?;
//!
//! let rent = Obligation::Recurring(RecurringObligation {
//!     id: "rent".to_string(),
//!     name: "Rent".to_string(),
//!     kind: ObligationKind::FixedExpense,
//!     amount: 1500.0,
//!     frequency: Frequency::Monthly,
//!     anchor_date: NaiveDate::from_ymd_opt(2024, 1, 1),
//!     anchor_kind: AnchorKind::StartDate,
//!     semi_monthly_first_day: None,
//!     semi_monthly_second_day: None,
//!     end_date: None,
//! });
//!
//! let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
//! let overdue = tracker.overdue("user-1", &[rent], None, today)?;
//! ```

pub mod backfill;
pub mod business_days;
pub mod config;
pub mod error;
pub mod ledger;
pub mod mutation;
pub mod reconciler;
pub mod recurrence;
pub mod schema;
#[cfg(feature = "sqlite")]
pub mod sqlite_ledger;
pub mod utils;

pub use backfill::Backfill;
pub use business_days::BusinessCalendar;
pub use config::EngineConfig;
pub use error::{Result, TrackerError};
pub use ledger::{CompletionLedger, InMemoryLedger, LedgerKey};
pub use mutation::CompletionService;
pub use reconciler::{auto_pick, OverdueSummary, PeriodSelection, Reconciler};
pub use recurrence::{expand, Evaluator};
pub use schema::*;
#[cfg(feature = "sqlite")]
pub use sqlite_ledger::SqliteLedger;

use chrono::NaiveDate;
use log::info;

/// Configuration plus a ledger, exposing every engine operation.
///
/// Holds no per-user state: the tracking start date and `today` are passed to
/// each call.
pub struct ObligationTracker<L: CompletionLedger> {
    config: EngineConfig,
    ledger: L,
}

impl<L: CompletionLedger> ObligationTracker<L> {
    pub fn new(config: EngineConfig, ledger: L) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, ledger })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(&self.config)
    }

    fn completions(&self) -> CompletionService<'_, L> {
        CompletionService::new(&self.ledger)
    }

    pub fn expand(&self, obligation: &Obligation, window: DateWindow) -> Vec<NaiveDate> {
        Evaluator::new(self.config.max_occurrences).expand(obligation, window)
    }

    pub fn reconcile(
        &self,
        user_id: &str,
        obligations: &[Obligation],
        window: DateWindow,
        tracking_start: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Vec<AnnotatedPeriod>> {
        self.reconciler()
            .reconcile(&self.ledger, user_id, obligations, window, tracking_start, today)
    }

    pub fn overdue(
        &self,
        user_id: &str,
        obligations: &[Obligation],
        tracking_start: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Vec<AnnotatedPeriod>> {
        self.reconciler()
            .overdue(&self.ledger, user_id, obligations, tracking_start, today)
    }

    pub fn period_selection(
        &self,
        user_id: &str,
        obligation: &Obligation,
        tracking_start: Option<NaiveDate>,
        today: NaiveDate,
    ) -> PeriodSelection {
        PeriodSelection::load(
            &self.reconciler(),
            &self.ledger,
            user_id,
            obligation,
            tracking_start,
            today,
        )
    }

    pub fn backfill(
        &self,
        user_id: &str,
        obligations: &[Obligation],
        new_tracking_start: NaiveDate,
    ) -> Result<usize> {
        Backfill::new(&self.config).run(&self.ledger, user_id, obligations, new_tracking_start)
    }

    /// Backfills for a newly chosen tracking start date. The caller persists the
    /// date itself once this succeeds.
    pub fn change_tracking_start(
        &self,
        user_id: &str,
        obligations: &[Obligation],
        new_tracking_start: NaiveDate,
        today: NaiveDate,
    ) -> Result<usize> {
        if new_tracking_start > today {
            return Err(TrackerError::DateError(format!(
                "tracking start {} is after today ({})",
                new_tracking_start, today
            )));
        }
        info!(
            "Changing tracking start for user {} to {}",
            user_id, new_tracking_start
        );
        self.backfill(user_id, obligations, new_tracking_start)
    }

    pub fn mark_complete(
        &self,
        user_id: &str,
        obligation: ObligationRef,
        period_date: NaiveDate,
        completed_date: NaiveDate,
        linked_transaction_id: Option<String>,
    ) -> Result<CompletionRecord> {
        self.completions().mark_complete(
            user_id,
            obligation,
            period_date,
            completed_date,
            linked_transaction_id,
        )
    }

    pub fn unmark_complete(
        &self,
        user_id: &str,
        obligation: ObligationRef,
        period_date: NaiveDate,
    ) -> Result<bool> {
        self.completions()
            .unmark_complete(user_id, obligation, period_date)
    }

    /// See [`CompletionService::remove_by_linked_transaction`] for the ordering precondition.
    pub fn remove_by_linked_transaction(&self, transaction_id: &str) -> Result<usize> {
        self.completions().remove_by_linked_transaction(transaction_id)
    }

    pub fn remove_transaction_with<F, E>(
        &self,
        transaction_id: &str,
        delete_transaction: F,
    ) -> Result<usize>
    where
        F: FnOnce(&str) -> std::result::Result<(), E>,
        E: std::fmt::Display,
    {
        self.completions()
            .remove_transaction_with(transaction_id, delete_transaction)
    }
}
