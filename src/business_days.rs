use crate::schema::ObligationKind;
use chrono::{Datelike, NaiveDate, Weekday};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// A year of consecutive non-business days means the calendar is unusable.
const MAX_ROLLBACK_DAYS: usize = 366;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessCalendar {
    #[serde(default = "default_weekend_days")]
    pub weekend_days: Vec<Weekday>,

    #[serde(default)]
    pub holidays: BTreeSet<NaiveDate>,
}

fn default_weekend_days() -> Vec<Weekday> {
    vec![Weekday::Sat, Weekday::Sun]
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self {
            weekend_days: default_weekend_days(),
            holidays: BTreeSet::new(),
        }
    }
}

impl BusinessCalendar {
    pub fn with_holidays<I: IntoIterator<Item = NaiveDate>>(mut self, holidays: I) -> Self {
        self.holidays.extend(holidays);
        self
    }

    pub fn is_business_day(&self, date: NaiveDate) -> bool {
        !self.weekend_days.contains(&date.weekday()) && !self.holidays.contains(&date)
    }

    /// Moves income occurrences that land on a non-business day back to the
    /// closest prior business day. Every other kind is returned untouched.
    pub fn adjust(&self, date: NaiveDate, kind: ObligationKind) -> NaiveDate {
        if kind != ObligationKind::Income {
            return date;
        }

        let mut adjusted = date;
        for _ in 0..MAX_ROLLBACK_DAYS {
            if self.is_business_day(adjusted) {
                return adjusted;
            }
            match adjusted.pred_opt() {
                Some(prev) => adjusted = prev,
                None => break,
            }
        }

        warn!(
            "No business day found within {} days before {}; keeping the original date",
            MAX_ROLLBACK_DAYS,
            date
        );
        date
    }
}
