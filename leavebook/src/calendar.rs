//! Calendar helpers for leave computations

use chrono::{Datelike, NaiveDate, Weekday};

/// Count working days (Monday through Friday) in the inclusive range.
/// Returns 0 when `end` is before `start`.
pub fn working_days_between(start: NaiveDate, end: NaiveDate) -> u32 {
    let mut days = 0;
    let mut date = start;
    while date <= end {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            days += 1;
        }
        date = match date.succ_opt() {
            Some(next) => next,
            None => break,
        };
    }
    days
}
