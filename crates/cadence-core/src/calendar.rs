//! Pure calendar arithmetic on UTC timestamps.
//!
//! Month addition clamps to the last valid day of the target month
//! (Jan 31 + 1 month is Feb 28/29), it never spills into the following month.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;

use crate::error::CoreError;
use crate::models::{DayOfMonth, IntervalUnit, WeekdaySet};

/// Weekday number with Sunday = 0, as used by the persisted weekday bitset.
#[inline]
pub fn weekday_index(day: Weekday) -> u8 {
    day.num_days_from_sunday() as u8
}

pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Adds `amount` of `unit` to `date`.
///
/// # Errors
/// `InvalidInput` when the result falls outside the representable calendar.
pub fn add_interval(
    date: DateTime<Utc>,
    unit: IntervalUnit,
    amount: u32,
) -> Result<DateTime<Utc>, CoreError> {
    let amount_i64 = i64::from(amount);
    let shifted = match unit {
        IntervalUnit::Hours => date.checked_add_signed(Duration::hours(amount_i64)),
        IntervalUnit::Days => date.checked_add_signed(Duration::days(amount_i64)),
        IntervalUnit::Weeks => date.checked_add_signed(Duration::weeks(amount_i64)),
        // chrono clamps the day to the end of the target month
        IntervalUnit::Months => date.checked_add_months(Months::new(amount)),
    };

    shifted.ok_or_else(|| {
        CoreError::InvalidInput(format!(
            "Adding {} {} to {} overflows the calendar",
            amount, unit, date
        ))
    })
}

/// Number of days in the given month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Moves `date` to the configured day of its own month, clamped to the month's length.
pub fn with_day_of_month(date: DateTime<Utc>, day_of_month: DayOfMonth) -> DateTime<Utc> {
    let last = days_in_month(date.year(), date.month());
    let day = match day_of_month {
        DayOfMonth::Day(day) => u32::from(day).min(last),
        DayOfMonth::Last => last,
    };
    date.with_day(day).unwrap_or(date)
}

/// Advances day by day until the weekday is not excluded. Returns `date` unchanged if allowed.
///
/// # Errors
/// `InvalidPattern` when `excluded` covers all seven weekdays.
pub fn next_allowed_weekday(
    date: DateTime<Utc>,
    excluded: WeekdaySet,
) -> Result<DateTime<Utc>, CoreError> {
    if excluded.is_full() {
        return Err(CoreError::InvalidPattern(
            "excluded weekdays cover the whole week".to_string(),
        ));
    }

    let mut candidate = date;
    while excluded.contains(candidate.weekday()) {
        candidate = add_interval(candidate, IntervalUnit::Days, 1)?;
    }
    Ok(candidate)
}

/// Whole days elapsed from `from` to `to` (negative when `to` is earlier).
#[inline]
pub fn elapsed_days(from: DateTime<Utc>, to: DateTime<Utc>) -> i64 {
    (to - from).num_days()
}

/// Calendar day of an instant as observed in `timezone`.
#[inline]
pub fn calendar_day(instant: DateTime<Utc>, timezone: &Tz) -> NaiveDate {
    instant.with_timezone(timezone).date_naive()
}
