//! Expands an obligation's recurrence rule into concrete due dates.
//!
//! Everything here is pure: the same obligation and window always produce the
//! same sorted, duplicate-free list. Malformed definitions never fail the
//! expansion; they fall back to a monthly rhythm and log a warning.

use crate::config::DEFAULT_MAX_OCCURRENCES;
use crate::schema::{
    AnchorKind, DateWindow, DebtAccount, Frequency, Obligation, RecurringObligation,
};
use crate::utils::{add_months, clamp_to_month, months_between};
use chrono::{Datelike, Days, NaiveDate};
use log::{debug, warn};

/// How one occurrence leads to the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Days(u64),
    /// `count` calendar months, landing on `day` (clamped to month length).
    Months { count: i32, day: u32 },
    SemiMonthly { first: u32, second: u32 },
}

impl Step {
    fn for_frequency(frequency: Frequency, day: u32, label: &str) -> Self {
        match frequency {
            Frequency::Daily => Step::Days(1),
            Frequency::Weekly => Step::Days(7),
            Frequency::BiWeekly => Step::Days(14),
            Frequency::Monthly => Step::Months { count: 1, day },
            Frequency::Quarterly => Step::Months { count: 3, day },
            Frequency::Yearly => Step::Months { count: 12, day },
            Frequency::SemiMonthly | Frequency::Unknown => {
                warn!(
                    "Obligation '{}' has frequency {:?} without usable parameters; expanding monthly",
                    label, frequency
                );
                Step::Months { count: 1, day }
            }
        }
    }

    fn semi_monthly(first: u32, second: u32) -> Self {
        if first <= second {
            Step::SemiMonthly { first, second }
        } else {
            Step::SemiMonthly {
                first: second,
                second: first,
            }
        }
    }

    /// Day-of-month rhythms (monthly, quarterly, semi-monthly) whose first
    /// occurrence is synthesized in the window's month when the anchor is later.
    fn projects_history(&self) -> bool {
        match self {
            Step::Months { count, .. } => *count < 12,
            Step::SemiMonthly { .. } => true,
            Step::Days(_) => false,
        }
    }

    /// First occurrence for a rule whose anchor lies after `start`: the anchor's
    /// day in `start`'s month, or in the following month when that is too early.
    fn project(&self, start: NaiveDate) -> Option<NaiveDate> {
        match *self {
            Step::Months { day, .. } => {
                let candidate = clamp_to_month(start.year(), start.month(), day);
                if candidate < start {
                    Some(add_months(candidate, 1, day))
                } else {
                    Some(candidate)
                }
            }
            _ => self.align(start, start),
        }
    }

    fn next(&self, date: NaiveDate) -> Option<NaiveDate> {
        match *self {
            Step::Days(days) => date.checked_add_days(Days::new(days)),
            Step::Months { count, day } => Some(add_months(date, count, day)),
            Step::SemiMonthly { first, second } => {
                let first_this = clamp_to_month(date.year(), date.month(), first);
                let second_this = clamp_to_month(date.year(), date.month(), second);
                if date < first_this {
                    Some(first_this)
                } else if date < second_this {
                    Some(second_this)
                } else {
                    Some(add_months(date, 1, first))
                }
            }
        }
    }

    /// First occurrence on or after `start` in the lattice generated from `origin`.
    /// Works whether `origin` is before or after `start`.
    fn align(&self, origin: NaiveDate, start: NaiveDate) -> Option<NaiveDate> {
        match *self {
            Step::Days(days) => {
                let days = days as i64;
                let diff = (start - origin).num_days();
                let mut n = diff.div_euclid(days);
                if diff.rem_euclid(days) != 0 {
                    n += 1;
                }
                let offset = n.checked_mul(days)?;
                if offset >= 0 {
                    origin.checked_add_days(Days::new(offset as u64))
                } else {
                    origin.checked_sub_days(Days::new(offset.unsigned_abs()))
                }
            }
            Step::Months { count, day } => {
                let mut n = months_between(origin, start).div_euclid(count);
                let mut candidate = add_months(origin, n * count, day);
                while candidate < start {
                    n += 1;
                    let next = add_months(origin, n * count, day);
                    if next <= candidate {
                        return None;
                    }
                    candidate = next;
                }
                Some(candidate)
            }
            // The pay-day pattern does not depend on the origin.
            Step::SemiMonthly { .. } => match start.pred_opt() {
                Some(before) => self.next(before),
                None => Some(start),
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    max_occurrences: usize,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OCCURRENCES)
    }
}

impl Evaluator {
    pub fn new(max_occurrences: usize) -> Self {
        Self {
            max_occurrences: max_occurrences.max(1),
        }
    }

    /// Occurrence dates of `obligation` inside `window`, sorted and unique.
    ///
    /// The window is closed (`start..=end`) except for semi-monthly rules,
    /// where a pay day on `end` itself is left out. An inverted window yields
    /// an empty list.
    pub fn expand(&self, obligation: &Obligation, window: DateWindow) -> Vec<NaiveDate> {
        if window.is_empty() {
            return Vec::new();
        }

        let mut dates = match obligation {
            Obligation::Recurring(item) => self.expand_recurring(item, window),
            Obligation::Debt(account) => self.expand_debt(account, window),
        };
        dates.sort();
        dates.dedup();

        debug!(
            "Expanded {} into {} occurrence(s) between {} and {}",
            obligation.reference(),
            dates.len(),
            window.start,
            window.end
        );
        dates
    }

    fn expand_recurring(&self, item: &RecurringObligation, window: DateWindow) -> Vec<NaiveDate> {
        let reference_day = item.anchor_date.unwrap_or(window.start).day();
        let step = match (
            item.frequency,
            item.semi_monthly_first_day,
            item.semi_monthly_second_day,
        ) {
            (Frequency::SemiMonthly, Some(first), Some(second)) => {
                Step::semi_monthly(first, second)
            }
            (frequency, _, _) => Step::for_frequency(frequency, reference_day, &item.id),
        };

        let first = match (item.anchor_date, item.anchor_kind) {
            (None, _) => step.align(window.start, window.start),
            (Some(anchor), AnchorKind::StartDate) if anchor > window.start => {
                if step.projects_history() {
                    step.project(window.start)
                } else {
                    Some(anchor)
                }
            }
            (Some(anchor), AnchorKind::StartDate) => step.align(anchor, window.start),
            // The renewal on the anchor is already paid, so nothing on or before it is due.
            (Some(anchor), AnchorKind::LastRenewal) => anchor
                .succ_opt()
                .and_then(|after| step.align(anchor, after.max(window.start))),
        };

        let half_open = matches!(step, Step::SemiMonthly { .. });
        self.collect(step, first, window, item.end_date, half_open)
    }

    fn expand_debt(&self, account: &DebtAccount, window: DateWindow) -> Vec<NaiveDate> {
        let day = account
            .payment_day_of_month
            .or_else(|| account.next_due_date.map(|d| d.day()))
            .unwrap_or_else(|| window.start.day());

        let step = match account.payment_frequency {
            Frequency::Weekly => Step::Days(7),
            Frequency::BiWeekly => Step::Days(14),
            Frequency::Monthly => Step::Months { count: 1, day },
            other => {
                warn!(
                    "Debt account '{}' has unsupported payment frequency {:?}; expanding monthly",
                    account.id, other
                );
                Step::Months { count: 1, day }
            }
        };

        let origin = match (account.next_due_date, step) {
            (Some(due), Step::Months { .. }) => clamp_to_month(due.year(), due.month(), day),
            (Some(due), _) => due,
            (None, _) if account.payment_day_of_month.is_some() => {
                clamp_to_month(window.start.year(), window.start.month(), day)
            }
            (None, _) => window.start,
        };

        // A due date after the window start is walked back before walking forward;
        // `align` covers both directions.
        let first = step.align(origin, window.start);
        self.collect(step, first, window, account.end_date, false)
    }

    fn collect(
        &self,
        step: Step,
        first: Option<NaiveDate>,
        window: DateWindow,
        end_date: Option<NaiveDate>,
        half_open: bool,
    ) -> Vec<NaiveDate> {
        let mut dates = Vec::new();
        let mut current = first;

        while let Some(date) = current {
            if date > window.end || (half_open && date >= window.end) {
                break;
            }
            if end_date.is_some_and(|end| date > end) {
                break;
            }
            if dates.len() >= self.max_occurrences {
                warn!(
                    "Occurrence cap of {} reached before {}; truncating",
                    self.max_occurrences, window.end
                );
                break;
            }
            if date >= window.start {
                dates.push(date);
            }

            current = match step.next(date) {
                Some(next) if next > date => Some(next),
                _ => None,
            };
        }

        dates
    }
}

/// Expands with the default occurrence cap.
pub fn expand(obligation: &Obligation, window: DateWindow) -> Vec<NaiveDate> {
    Evaluator::default().expand(obligation, window)
}
