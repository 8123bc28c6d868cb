//! Joins expanded periods with the completion ledger.
//!
//! A period before the tracking start date is always completed, whatever the
//! ledger says. Otherwise it is completed iff a ledger record exists for its
//! exact `(obligation, date)`, and overdue iff it is not completed and its date
//! is before `today`.

use crate::business_days::BusinessCalendar;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::ledger::CompletionLedger;
use crate::recurrence::Evaluator;
use crate::schema::{
    AnnotatedPeriod, CompletionRecord, DateWindow, Obligation, ObligationRef, Period,
};
use crate::utils::{add_months, year_start};
use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub struct Reconciler<'a> {
    evaluator: Evaluator,
    calendar: &'a BusinessCalendar,
    picker_lookahead_months: u32,
}

impl<'a> Reconciler<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self {
            evaluator: Evaluator::new(config.max_occurrences),
            calendar: &config.business_calendar,
            picker_lookahead_months: config.picker_lookahead_months,
        }
    }

    /// Expanded occurrence dates of `obligation`, with income moved off non-business days.
    pub fn occurrences(&self, obligation: &Obligation, window: DateWindow) -> Vec<NaiveDate> {
        let kind = obligation.kind();
        self.evaluator
            .expand(obligation, window)
            .into_iter()
            .map(|date| self.calendar.adjust(date, kind))
            .collect()
    }

    /// Annotated periods of every obligation in `window`, sorted by period date.
    ///
    /// Reads the ledger once. A failed read is returned as an error rather than
    /// reported as "nothing completed".
    pub fn reconcile<L: CompletionLedger + ?Sized>(
        &self,
        ledger: &L,
        user_id: &str,
        obligations: &[Obligation],
        window: DateWindow,
        tracking_start: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Vec<AnnotatedPeriod>> {
        let expanded: Vec<(&Obligation, Vec<NaiveDate>)> = obligations
            .iter()
            .map(|obligation| (obligation, self.occurrences(obligation, window)))
            .collect();

        let bounds = expanded
            .iter()
            .flat_map(|(_, dates)| dates.iter().copied())
            .fold(None, |acc: Option<(NaiveDate, NaiveDate)>, date| match acc {
                None => Some((date, date)),
                Some((lo, hi)) => Some((lo.min(date), hi.max(date))),
            });

        let Some((first, last)) = bounds else {
            return Ok(Vec::new());
        };

        let records: HashMap<(ObligationRef, NaiveDate), CompletionRecord> = ledger
            .find_in_range(user_id, first, last)?
            .into_iter()
            .map(|r| ((r.obligation.clone(), r.period_date), r))
            .collect();

        let mut periods = Vec::new();
        for (obligation, dates) in expanded {
            let reference = obligation.reference();
            for date in dates {
                let record = records.get(&(reference.clone(), date));
                let period = Period {
                    obligation: reference.clone(),
                    period_date: date,
                };
                periods.push(annotate(period, obligation, record, tracking_start, today));
            }
        }

        periods.sort_by(|a, b| {
            a.period
                .period_date
                .cmp(&b.period.period_date)
                .then_with(|| a.period.obligation.cmp(&b.period.obligation))
        });

        debug!(
            "Reconciled {} period(s) for user {} against {} ledger record(s)",
            periods.len(),
            user_id,
            records.len()
        );
        Ok(periods)
    }

    /// Overdue periods across all obligations, from the tracking start date up to today.
    pub fn overdue<L: CompletionLedger + ?Sized>(
        &self,
        ledger: &L,
        user_id: &str,
        obligations: &[Obligation],
        tracking_start: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Vec<AnnotatedPeriod>> {
        let window = DateWindow::new(history_start(tracking_start, today), today);
        let periods = self.reconcile(ledger, user_id, obligations, window, tracking_start, today)?;
        Ok(periods.into_iter().filter(|p| p.is_overdue).collect())
    }

    /// Periods offered when recording a transaction against one obligation:
    /// from the tracking start date to a few months past today.
    pub fn periods_for_obligation<L: CompletionLedger + ?Sized>(
        &self,
        ledger: &L,
        user_id: &str,
        obligation: &Obligation,
        tracking_start: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Result<Vec<AnnotatedPeriod>> {
        let end = add_months(today, self.picker_lookahead_months as i32, today.day());
        let window = DateWindow::new(history_start(tracking_start, today), end);
        self.reconcile(
            ledger,
            user_id,
            std::slice::from_ref(obligation),
            window,
            tracking_start,
            today,
        )
    }
}

/// Start of the history considered "tracked". Without a tracking start date,
/// that is January 1 of the current year.
pub fn history_start(tracking_start: Option<NaiveDate>, today: NaiveDate) -> NaiveDate {
    tracking_start.unwrap_or_else(|| year_start(today))
}

pub fn annotate(
    period: Period,
    obligation: &Obligation,
    record: Option<&CompletionRecord>,
    tracking_start: Option<NaiveDate>,
    today: NaiveDate,
) -> AnnotatedPeriod {
    let date = period.period_date;
    let auto_completed = tracking_start.is_some_and(|start| date < start);
    let is_completed = record.is_some() || auto_completed;
    let is_overdue = date < today && !is_completed;

    AnnotatedPeriod {
        name: obligation.name().to_string(),
        kind: obligation.kind(),
        amount: obligation.amount(),
        is_completed,
        is_overdue,
        days_past_due: is_overdue.then(|| (today - date).num_days()),
        completed_date: record
            .map(|r| r.completed_date)
            .or_else(|| auto_completed.then_some(date)),
        auto_completed,
        linked_transaction_id: record.and_then(|r| r.linked_transaction_id.clone()),
        period,
    }
}

/// Earliest overdue period, else the earliest open one, else nothing.
pub fn auto_pick(periods: &[AnnotatedPeriod]) -> Option<&AnnotatedPeriod> {
    periods
        .iter()
        .filter(|p| p.is_overdue)
        .min_by_key(|p| p.period_date())
        .or_else(|| {
            periods
                .iter()
                .filter(|p| !p.is_completed)
                .min_by_key(|p| p.period_date())
        })
}

/// What a period picker shows for one obligation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodSelection {
    pub periods: Vec<AnnotatedPeriod>,
    pub selected: Option<NaiveDate>,
    /// False when the periods could not be loaded; the picker is then empty
    /// but transaction entry carries on without a period.
    pub enabled: bool,
}

impl PeriodSelection {
    pub fn disabled() -> Self {
        Self {
            periods: Vec::new(),
            selected: None,
            enabled: false,
        }
    }

    pub fn load<L: CompletionLedger + ?Sized>(
        reconciler: &Reconciler<'_>,
        ledger: &L,
        user_id: &str,
        obligation: &Obligation,
        tracking_start: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Self {
        let loaded =
            reconciler.periods_for_obligation(ledger, user_id, obligation, tracking_start, today);
        match loaded {
            Ok(periods) => {
                let selected = auto_pick(&periods).map(|p| p.period_date());
                Self {
                    periods,
                    selected,
                    enabled: true,
                }
            }
            Err(e) => {
                warn!(
                    "Could not load periods for {}: {}; disabling period selection",
                    obligation.reference(),
                    e
                );
                Self::disabled()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OverdueSummary {
    pub count: usize,
    pub total_amount: f64,
    pub oldest: Option<NaiveDate>,
    pub max_days_past_due: i64,
}

impl OverdueSummary {
    pub fn from_periods(periods: &[AnnotatedPeriod]) -> Self {
        periods
            .iter()
            .filter(|p| p.is_overdue)
            .fold(Self::default(), |mut summary, p| {
                summary.count += 1;
                summary.total_amount += p.amount;
                summary.oldest = Some(match summary.oldest {
                    Some(oldest) => oldest.min(p.period_date()),
                    None => p.period_date(),
                });
                summary.max_days_past_due = summary
                    .max_days_past_due
                    .max(p.days_past_due.unwrap_or(0));
                summary
            })
    }
}
