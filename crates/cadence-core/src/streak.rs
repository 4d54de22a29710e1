use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::BTreeSet;

use crate::ledger::completion_days;
use crate::models::{CompletionRecord, StreakState};

/// StreakCalculator: derives habit streak state from completion history.
///
/// Completions are bucketed into calendar days of the configured timezone; several
/// completions on one day count once. Days after `today` in that timezone are ignored by
/// every field of the result.
///
/// * Current streak: walk the days newest first with `expected = today`; a day counts
///   while `expected - day <= grace`, after which `expected` becomes the day before it.
/// * Longest streak: walk the days oldest first; a run continues while consecutive days
///   are at most `grace + 1` apart.
#[derive(Debug, Clone, Copy)]
pub struct StreakCalculator {
    timezone: Tz,
}

impl Default for StreakCalculator {
    fn default() -> Self {
        Self { timezone: Tz::UTC }
    }
}

impl StreakCalculator {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    pub fn timezone(&self) -> &Tz {
        &self.timezone
    }

    pub fn compute(
        &self,
        records: &[CompletionRecord],
        grace_period_days: u32,
        today: NaiveDate,
    ) -> StreakState {
        let days = completion_days(records, &self.timezone);
        streak_from_days(&days, grace_period_days, today)
    }
}

/// Streak state with calendar days taken in UTC.
pub fn compute_streak(
    records: &[CompletionRecord],
    grace_period_days: u32,
    today: NaiveDate,
) -> StreakState {
    StreakCalculator::default().compute(records, grace_period_days, today)
}

fn streak_from_days(
    days: &BTreeSet<NaiveDate>,
    grace_period_days: u32,
    today: NaiveDate,
) -> StreakState {
    let grace = i64::from(grace_period_days);

    let mut past = days.range(..=today);

    let mut current_streak = 0u32;
    let mut expected = today;
    for &day in past.clone().rev() {
        if (expected - day).num_days() > grace {
            break;
        }
        current_streak += 1;
        match day.pred_opt() {
            Some(previous) => expected = previous,
            None => break,
        }
    }

    let mut longest_streak = 0u32;
    let mut run = 0u32;
    let mut previous: Option<NaiveDate> = None;
    for &day in past.clone() {
        run = match previous {
            Some(prev) if (day - prev).num_days() <= grace + 1 => run + 1,
            _ => 1,
        };
        longest_streak = longest_streak.max(run);
        previous = Some(day);
    }

    StreakState {
        current_streak,
        longest_streak: longest_streak.max(current_streak),
        is_completed_today: days.contains(&today),
        days_since_last_completion: past.next_back().map(|last| (today - *last).num_days()),
    }
}
