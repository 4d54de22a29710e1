use chrono::{DateTime, Datelike, Utc};
use tracing::debug;

use crate::calendar;
use crate::error::CoreError;
use crate::models::{IntervalUnit, RecurrenceKind, RecurrencePattern};

/// RecurrenceResolver: computes due dates for a validated recurrence pattern.
///
/// Responsibilities:
/// 1. Fixed-schedule resolution: smallest schedule point strictly after a reference
///    time, moved off excluded weekdays
/// 2. After-completion resolution: interval offset from the actual completion moment
/// 3. Termination via `end_date` and `max_occurrence_count`, reported as `Ok(None)`
/// 4. Previews of upcoming due dates for configuration screens
///
/// Every method is a pure function of the pattern and its arguments, so retried
/// completions recompute identical dates.
#[derive(Debug, Clone, Copy)]
pub struct RecurrenceResolver<'a> {
    pattern: &'a RecurrencePattern,
}

impl<'a> RecurrenceResolver<'a> {
    /// Wraps a pattern after checking its invariants.
    ///
    /// # Errors
    /// `InvalidPattern` when the pattern fails [`RecurrencePattern::validate`].
    pub fn new(pattern: &'a RecurrencePattern) -> Result<Self, CoreError> {
        pattern.validate()?;
        Ok(Self { pattern })
    }

    pub fn pattern(&self) -> &RecurrencePattern {
        self.pattern
    }

    /// Next due date after a completion, dispatching on the recurrence kind.
    ///
    /// Fixed schedules resolve against `now`; after-completion patterns against `completed_at`.
    pub fn next_due(
        &self,
        completed_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        match self.pattern.kind {
            RecurrenceKind::FixedSchedule => self.next_fixed_schedule(now),
            RecurrenceKind::AfterCompletion => self.next_after_completion(completed_at),
        }
    }

    /// Smallest schedule point strictly after `reference`, shifted off excluded weekdays.
    ///
    /// Returns `None` for one-time patterns and exhausted patterns.
    pub fn next_fixed_schedule(
        &self,
        reference: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        if self.pattern.is_one_time() || self.is_count_exhausted() {
            return Ok(None);
        }
        self.fixed_point_after(reference)
    }

    /// `completed_at` plus the interval. Excluded weekdays are deliberately not applied here.
    ///
    /// Returns `None` for one-time patterns and exhausted patterns.
    pub fn next_after_completion(
        &self,
        completed_at: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        if self.pattern.is_one_time() || self.is_count_exhausted() {
            return Ok(None);
        }
        self.interval_after(completed_at)
    }

    /// Due date of the first occurrence of a freshly created group.
    ///
    /// Fixed schedules start at the first schedule point on or after the anchor, or after
    /// `now` when the anchor already lies in the past. After-completion groups start at
    /// `requested`, defaulting to `now`.
    pub fn first_due(
        &self,
        requested: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        match self.pattern.kind {
            RecurrenceKind::FixedSchedule => {
                let anchor = self.anchor()?;
                if self.pattern.is_one_time() {
                    let shifted =
                        calendar::next_allowed_weekday(anchor, self.pattern.excluded_weekdays)?;
                    return Ok(self.within_end_date(shifted));
                }
                let reference = if anchor >= now {
                    anchor - chrono::Duration::seconds(1)
                } else {
                    now
                };
                self.fixed_point_after(reference)
            }
            RecurrenceKind::AfterCompletion => {
                Ok(self.within_end_date(requested.unwrap_or(now)))
            }
        }
    }

    /// Upcoming due dates strictly after `from`, at most `count` of them.
    ///
    /// After-completion previews assume every occurrence is completed exactly when due.
    /// The remaining `max_occurrence_count` budget and `end_date` cut the preview short.
    pub fn preview(
        &self,
        from: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<DateTime<Utc>>, CoreError> {
        if self.pattern.is_one_time() {
            return Ok(Vec::new());
        }

        let mut remaining = self
            .pattern
            .max_occurrence_count
            .map(|max| max.saturating_sub(self.pattern.generated_count));
        let mut dates = Vec::with_capacity(count.min(64));
        let mut cursor = from;

        while dates.len() < count && remaining != Some(0) {
            let next = match self.pattern.kind {
                RecurrenceKind::FixedSchedule => self.fixed_point_after(cursor)?,
                RecurrenceKind::AfterCompletion => self.interval_after(cursor)?,
            };
            let Some(next) = next else { break };
            dates.push(next);
            cursor = next;
            remaining = remaining.map(|left| left - 1);
        }

        Ok(dates)
    }

    fn is_count_exhausted(&self) -> bool {
        let exhausted = self.pattern.is_count_exhausted();
        if exhausted {
            debug!(
                generated = self.pattern.generated_count,
                max = ?self.pattern.max_occurrence_count,
                "recurrence exhausted by occurrence count"
            );
        }
        exhausted
    }

    fn anchor(&self) -> Result<DateTime<Utc>, CoreError> {
        self.pattern.anchor_date.ok_or_else(|| {
            CoreError::InvalidPattern("a fixed schedule requires an anchor date".to_string())
        })
    }

    fn fixed_point_after(
        &self,
        reference: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, CoreError> {
        let anchor = self.anchor()?;
        let mut step = self.first_step_estimate(anchor, reference);

        let candidate = loop {
            let point = self.schedule_point(anchor, step)?;
            if point > reference && point >= anchor {
                break point;
            }
            step = step.checked_add(1).ok_or_else(|| {
                CoreError::InvalidInput("Schedule step count overflowed".to_string())
            })?;
        };

        let shifted = calendar::next_allowed_weekday(candidate, self.pattern.excluded_weekdays)?;
        if shifted != candidate {
            debug!(%candidate, %shifted, "moved schedule point off excluded weekday");
        }
        Ok(self.within_end_date(shifted))
    }

    fn interval_after(&self, from: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, CoreError> {
        let mut candidate = calendar::add_interval(
            from,
            self.pattern.interval_unit,
            self.pattern.interval_value,
        )?;
        if let (IntervalUnit::Months, Some(day)) =
            (self.pattern.interval_unit, self.pattern.day_of_month)
        {
            candidate = calendar::with_day_of_month(candidate, day);
        }
        Ok(self.within_end_date(candidate))
    }

    /// Schedule point `step`, computed from the anchor so month clamping never drifts.
    fn schedule_point(&self, anchor: DateTime<Utc>, step: u32) -> Result<DateTime<Utc>, CoreError> {
        let amount = step.checked_mul(self.pattern.interval_value).ok_or_else(|| {
            CoreError::InvalidInput("Schedule offset overflowed".to_string())
        })?;
        let point = calendar::add_interval(anchor, self.pattern.interval_unit, amount)?;

        Ok(match (self.pattern.interval_unit, self.pattern.day_of_month) {
            (IntervalUnit::Months, Some(day)) => calendar::with_day_of_month(point, day),
            _ => point,
        })
    }

    /// Largest step known not to pass `reference`, so the stepping loop stays short.
    fn first_step_estimate(&self, anchor: DateTime<Utc>, reference: DateTime<Utc>) -> u32 {
        if reference < anchor {
            return 0;
        }
        let value = i64::from(self.pattern.interval_value.max(1));
        let elapsed = reference - anchor;

        let steps = match self.pattern.interval_unit {
            IntervalUnit::Hours => elapsed.num_hours() / value,
            IntervalUnit::Days => elapsed.num_days() / value,
            IntervalUnit::Weeks => elapsed.num_weeks() / value,
            IntervalUnit::Months => {
                let months = (i64::from(reference.year()) - i64::from(anchor.year())) * 12
                    + i64::from(reference.month())
                    - i64::from(anchor.month());
                // one step back absorbs day-of-month clamping
                months / value - 1
            }
        };

        u32::try_from(steps.max(0)).unwrap_or(u32::MAX)
    }

    fn within_end_date(&self, candidate: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self.pattern.end_date {
            Some(end) if candidate > end => {
                debug!(%candidate, %end, "recurrence exhausted by end date");
                None
            }
            _ => Some(candidate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DayOfMonth, WeekdaySet};
    use chrono::{Duration, TimeZone, Weekday};
    use proptest::prelude::*;
    use rstest::rstest;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    mod fixed_schedule_tests {
        use super::*;

        #[test]
        fn test_weekly_completed_on_sunday() {
            // Monday anchor, completed the following Sunday
            let pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Weeks, 1, utc(2024, 1, 1, 0, 0));
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            let next = resolver.next_fixed_schedule(utc(2024, 1, 7, 18, 0)).unwrap();
            assert_eq!(next, Some(utc(2024, 1, 8, 0, 0)));
            assert_eq!(next.unwrap().weekday(), Weekday::Mon);
        }

        #[test]
        fn test_biweekly_with_weekend_excluded_keeps_monday() {
            let pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Weeks, 2, utc(2024, 1, 1, 0, 0))
                    .excluding(WeekdaySet::WEEKEND);
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            // Friday of week 2
            let next = resolver.next_fixed_schedule(utc(2024, 1, 12, 17, 0)).unwrap();
            assert_eq!(next, Some(utc(2024, 1, 15, 0, 0)));
        }

        #[test]
        fn test_excluded_weekday_shifts_forward() {
            // Saturday anchor, weekly, weekends excluded: every point lands on Monday
            let pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Weeks, 1, utc(2024, 1, 6, 9, 0))
                    .excluding(WeekdaySet::WEEKEND);
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            let next = resolver.next_fixed_schedule(utc(2024, 1, 6, 10, 0)).unwrap();
            assert_eq!(next, Some(utc(2024, 1, 15, 9, 0)));
        }

        #[test]
        fn test_reference_exactly_on_schedule_point_moves_past_it() {
            let pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Days, 1, utc(2024, 1, 1, 9, 0));
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            let next = resolver.next_fixed_schedule(utc(2024, 1, 5, 9, 0)).unwrap();
            assert_eq!(next, Some(utc(2024, 1, 6, 9, 0)));
        }

        #[test]
        fn test_reference_before_anchor_yields_anchor() {
            let pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Days, 3, utc(2024, 3, 1, 9, 0));
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            let next = resolver.next_fixed_schedule(utc(2024, 1, 1, 0, 0)).unwrap();
            assert_eq!(next, Some(utc(2024, 3, 1, 9, 0)));
        }

        #[rstest]
        #[case(utc(2024, 1, 31, 12, 0), utc(2024, 2, 29, 9, 0))]
        #[case(utc(2024, 2, 29, 12, 0), utc(2024, 3, 31, 9, 0))]
        #[case(utc(2024, 4, 1, 0, 0), utc(2024, 4, 30, 9, 0))]
        fn test_monthly_from_month_end_anchor_does_not_drift(
            #[case] reference: DateTime<Utc>,
            #[case] expected: DateTime<Utc>,
        ) {
            let pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Months, 1, utc(2024, 1, 31, 9, 0));
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            assert_eq!(resolver.next_fixed_schedule(reference).unwrap(), Some(expected));
        }

        #[test]
        fn test_monthly_last_day_of_month() {
            let pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Months, 1, utc(2024, 1, 10, 8, 0))
                    .on_day_of_month(DayOfMonth::Last);
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            assert_eq!(
                resolver.next_fixed_schedule(utc(2024, 1, 31, 9, 0)).unwrap(),
                Some(utc(2024, 2, 29, 8, 0))
            );
        }

        #[test]
        fn test_hourly_far_from_anchor() {
            let pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Hours, 6, utc(2020, 1, 1, 0, 0));
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            assert_eq!(
                resolver.next_fixed_schedule(utc(2024, 6, 1, 13, 30)).unwrap(),
                Some(utc(2024, 6, 1, 18, 0))
            );
        }

        #[test]
        fn test_one_time_returns_none() {
            let mut pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Days, 0, utc(2024, 1, 1, 0, 0));
            pattern.next_due_date = None;
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            assert_eq!(resolver.next_fixed_schedule(utc(2024, 1, 2, 0, 0)).unwrap(), None);
        }

        #[test]
        fn test_end_date_exhausts() {
            let pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Days, 1, utc(2024, 1, 1, 9, 0))
                    .ending_at(utc(2024, 1, 5, 23, 59));
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            assert_eq!(
                resolver.next_fixed_schedule(utc(2024, 1, 4, 10, 0)).unwrap(),
                Some(utc(2024, 1, 5, 9, 0))
            );
            assert_eq!(resolver.next_fixed_schedule(utc(2024, 1, 5, 10, 0)).unwrap(), None);
        }

        #[test]
        fn test_occurrence_count_exhausts() {
            let mut pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Days, 1, utc(2024, 1, 1, 9, 0))
                    .limited_to(3);
            pattern.generated_count = 3;
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            assert_eq!(resolver.next_fixed_schedule(utc(2024, 1, 2, 0, 0)).unwrap(), None);
        }

        #[test]
        fn test_invalid_pattern_is_rejected_up_front() {
            let mut pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Days, 1, utc(2024, 1, 1, 9, 0));
            pattern.anchor_date = None;
            assert!(matches!(
                RecurrenceResolver::new(&pattern),
                Err(CoreError::InvalidPattern(_))
            ));
        }
    }

    mod after_completion_tests {
        use super::*;

        #[test]
        fn test_anchored_to_actual_completion() {
            // Due 2024-01-05, completed late on 2024-01-08T10:00
            let pattern = RecurrencePattern::after_completion(IntervalUnit::Days, 3);
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            assert_eq!(
                resolver.next_after_completion(utc(2024, 1, 8, 10, 0)).unwrap(),
                Some(utc(2024, 1, 11, 10, 0))
            );
        }

        #[test]
        fn test_ignores_excluded_weekdays() {
            let pattern = RecurrencePattern::after_completion(IntervalUnit::Days, 1)
                .excluding(WeekdaySet::WEEKEND);
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            // Friday + 1 day is a Saturday and stays there
            let next = resolver.next_after_completion(utc(2024, 1, 5, 9, 0)).unwrap();
            assert_eq!(next, Some(utc(2024, 1, 6, 9, 0)));
        }

        #[test]
        fn test_monthly_with_day_of_month() {
            let pattern = RecurrencePattern::after_completion(IntervalUnit::Months, 1)
                .on_day_of_month(DayOfMonth::Day(1));
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            assert_eq!(
                resolver.next_after_completion(utc(2024, 1, 20, 7, 0)).unwrap(),
                Some(utc(2024, 2, 1, 7, 0))
            );
        }

        #[test]
        fn test_end_date_and_zero_interval() {
            let ending = RecurrencePattern::after_completion(IntervalUnit::Weeks, 1)
                .ending_at(utc(2024, 1, 10, 0, 0));
            let resolver = RecurrenceResolver::new(&ending).unwrap();
            assert_eq!(resolver.next_after_completion(utc(2024, 1, 5, 0, 0)).unwrap(), None);

            let one_time = RecurrencePattern::after_completion(IntervalUnit::Weeks, 0);
            let resolver = RecurrenceResolver::new(&one_time).unwrap();
            assert_eq!(resolver.next_after_completion(utc(2024, 1, 5, 0, 0)).unwrap(), None);
        }

        #[test]
        fn test_next_due_dispatches_on_kind() {
            let completed_at = utc(2024, 1, 8, 10, 0);
            let now = utc(2024, 1, 9, 12, 0);

            let after = RecurrencePattern::after_completion(IntervalUnit::Days, 1);
            assert_eq!(
                RecurrenceResolver::new(&after).unwrap().next_due(completed_at, now).unwrap(),
                Some(utc(2024, 1, 9, 10, 0))
            );

            let fixed =
                RecurrencePattern::fixed_schedule(IntervalUnit::Days, 1, utc(2024, 1, 1, 8, 0));
            assert_eq!(
                RecurrenceResolver::new(&fixed).unwrap().next_due(completed_at, now).unwrap(),
                Some(utc(2024, 1, 10, 8, 0))
            );
        }
    }

    mod first_due_tests {
        use super::*;

        #[test]
        fn test_future_anchor_is_first_due() {
            let pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Weeks, 1, utc(2024, 2, 5, 9, 0));
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            assert_eq!(
                resolver.first_due(None, utc(2024, 1, 1, 0, 0)).unwrap(),
                Some(utc(2024, 2, 5, 9, 0))
            );
        }

        #[test]
        fn test_future_anchor_on_excluded_day_shifts() {
            let pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Weeks, 1, utc(2024, 2, 3, 9, 0))
                    .excluding(WeekdaySet::WEEKEND);
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            assert_eq!(
                resolver.first_due(None, utc(2024, 1, 1, 0, 0)).unwrap(),
                Some(utc(2024, 2, 5, 9, 0))
            );
        }

        #[test]
        fn test_past_anchor_starts_after_now() {
            let pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Days, 1, utc(2023, 6, 1, 9, 0));
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            assert_eq!(
                resolver.first_due(None, utc(2024, 1, 1, 12, 0)).unwrap(),
                Some(utc(2024, 1, 2, 9, 0))
            );
        }

        #[test]
        fn test_after_completion_uses_requested_or_now() {
            let pattern = RecurrencePattern::after_completion(IntervalUnit::Days, 2);
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            let now = utc(2024, 1, 1, 12, 0);
            assert_eq!(resolver.first_due(None, now).unwrap(), Some(now));
            let requested = utc(2024, 1, 3, 8, 0);
            assert_eq!(resolver.first_due(Some(requested), now).unwrap(), Some(requested));
        }
    }

    mod preview_tests {
        use super::*;

        #[test]
        fn test_fixed_schedule_preview_skips_weekend() {
            let pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Days, 1, utc(2024, 1, 1, 9, 0))
                    .excluding(WeekdaySet::WEEKEND);
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            let dates = resolver.preview(utc(2024, 1, 4, 12, 0), 3).unwrap();
            assert_eq!(
                dates,
                vec![utc(2024, 1, 5, 9, 0), utc(2024, 1, 8, 9, 0), utc(2024, 1, 9, 9, 0)]
            );
        }

        #[test]
        fn test_after_completion_preview_chains_interval() {
            let pattern = RecurrencePattern::after_completion(IntervalUnit::Weeks, 2);
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            let from = utc(2024, 1, 1, 9, 0);
            let dates = resolver.preview(from, 3).unwrap();
            assert_eq!(
                dates,
                vec![
                    from + Duration::weeks(2),
                    from + Duration::weeks(4),
                    from + Duration::weeks(6)
                ]
            );
        }

        #[test]
        fn test_preview_respects_remaining_count() {
            let mut pattern =
                RecurrencePattern::fixed_schedule(IntervalUnit::Days, 1, utc(2024, 1, 1, 9, 0))
                    .limited_to(5);
            pattern.generated_count = 3;
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            assert_eq!(resolver.preview(utc(2024, 1, 1, 0, 0), 10).unwrap().len(), 2);
        }

        #[test]
        fn test_preview_of_one_time_is_empty() {
            let pattern = RecurrencePattern::after_completion(IntervalUnit::Days, 0);
            let resolver = RecurrenceResolver::new(&pattern).unwrap();
            assert!(resolver.preview(utc(2024, 1, 1, 0, 0), 5).unwrap().is_empty());
        }
    }

    fn unit_strategy() -> impl Strategy<Value = IntervalUnit> {
        prop_oneof![
            Just(IntervalUnit::Hours),
            Just(IntervalUnit::Days),
            Just(IntervalUnit::Weeks),
            Just(IntervalUnit::Months),
        ]
    }

    proptest! {
        #[test]
        fn prop_fixed_schedule_is_strictly_after_reference(
            unit in unit_strategy(),
            interval in 1u32..40,
            anchor_offset in 0i64..2_000_000,
            reference_offset in 0i64..400_000_000,
            excluded_bits in 0i64..127,
        ) {
            let anchor = utc(2020, 1, 1, 0, 0) + Duration::minutes(anchor_offset);
            let reference = utc(2020, 1, 1, 0, 0) + Duration::seconds(reference_offset);
            let excluded = WeekdaySet::from_bits(excluded_bits).unwrap();
            let pattern =
                RecurrencePattern::fixed_schedule(unit, interval, anchor).excluding(excluded);
            let resolver = RecurrenceResolver::new(&pattern).unwrap();

            let first = resolver.next_fixed_schedule(reference).unwrap().unwrap();
            let second = resolver.next_fixed_schedule(reference).unwrap().unwrap();

            prop_assert!(first > reference);
            prop_assert_eq!(first, second);
            prop_assert!(!excluded.contains(first.weekday()));
        }

        #[test]
        fn prop_after_completion_ignores_due_date(
            unit in unit_strategy(),
            interval in 0u32..60,
            completed_offset in 0i64..100_000_000,
        ) {
            let completed_at = utc(2021, 3, 1, 0, 0) + Duration::seconds(completed_offset);
            let early = RecurrencePattern::after_completion(unit, interval);
            let mut late = early.clone();
            late.next_due_date = Some(completed_at - Duration::days(10));
            let early_next = RecurrenceResolver::new(&early)
                .unwrap()
                .next_after_completion(completed_at)
                .unwrap();
            let late_next = RecurrenceResolver::new(&late)
                .unwrap()
                .next_after_completion(completed_at)
                .unwrap();
            prop_assert_eq!(early_next, late_next);
            prop_assert_eq!(early_next.is_none(), interval == 0);
        }
    }
}
