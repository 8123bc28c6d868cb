use chrono::{Datelike, Days, NaiveDate, NaiveDateTime};

pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    let next_month = if month == 12 { 1 } else { month + 1 };
    let next_year = if month == 12 { year + 1 } else { year };

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.checked_sub_days(Days::new(1)))
        .unwrap_or(NaiveDate::MAX)
}

/// Builds `year-month-day`, pulling `day` back to the last day of the month
/// when the month is shorter (e.g. day 31 in February).
pub fn clamp_to_month(year: i32, month: u32, day: u32) -> NaiveDate {
    let last = last_day_of_month(year, month);
    let day = day.clamp(1, last.day());
    NaiveDate::from_ymd_opt(year, month, day).unwrap_or(last)
}

/// Moves `(year, month)` by `delta` months, handling year rollover in both directions.
pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + (month as i32 - 1) + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

/// Adds `delta` calendar months to `date`, keeping `target_day` where the
/// resulting month allows it.
pub fn add_months(date: NaiveDate, delta: i32, target_day: u32) -> NaiveDate {
    let (year, month) = shift_month(date.year(), date.month(), delta);
    clamp_to_month(year, month, target_day)
}

pub fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    let year_diff = end.year() - start.year();
    let month_diff = end.month() as i32 - start.month() as i32;
    year_diff * 12 + month_diff
}

pub fn year_start(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date)
}

/// Drops the time-of-day so comparisons happen at day granularity.
pub fn start_of_day(instant: NaiveDateTime) -> NaiveDate {
    instant.date()
}
