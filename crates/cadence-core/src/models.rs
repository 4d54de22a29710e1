use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::calendar::{weekday_from_index, weekday_index};
use crate::error::CoreError;
use crate::nudge::NudgePolicy;

// ============================================================================
// Recurrence Pattern
// ============================================================================

/// How the next occurrence of a recurrence group is placed in time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    /// Next occurrence follows a calendar anchor, independent of completion time
    FixedSchedule,
    /// Next occurrence is offset from the actual completion timestamp
    AfterCompletion,
}

impl fmt::Display for RecurrenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecurrenceKind::FixedSchedule => write!(f, "fixed_schedule"),
            RecurrenceKind::AfterCompletion => write!(f, "after_completion"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid recurrence kind: {0}")]
pub struct ParseRecurrenceKindError(String);

impl FromStr for RecurrenceKind {
    type Err = ParseRecurrenceKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "fixed_schedule" | "fixed" => Ok(RecurrenceKind::FixedSchedule),
            "after_completion" | "after" => Ok(RecurrenceKind::AfterCompletion),
            _ => Err(ParseRecurrenceKindError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum IntervalUnit {
    Hours,
    Days,
    Weeks,
    Months,
}

impl fmt::Display for IntervalUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntervalUnit::Hours => write!(f, "hours"),
            IntervalUnit::Days => write!(f, "days"),
            IntervalUnit::Weeks => write!(f, "weeks"),
            IntervalUnit::Months => write!(f, "months"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid interval unit: {0}")]
pub struct ParseIntervalUnitError(String);

impl FromStr for IntervalUnit {
    type Err = ParseIntervalUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "hour" | "hours" | "h" => Ok(IntervalUnit::Hours),
            "day" | "days" | "d" => Ok(IntervalUnit::Days),
            "week" | "weeks" | "w" => Ok(IntervalUnit::Weeks),
            "month" | "months" | "m" => Ok(IntervalUnit::Months),
            _ => Err(ParseIntervalUnitError(s.to_string())),
        }
    }
}

/// A set of weekdays stored as a 7-bit mask. Bit `n` is weekday `n` with Sunday = 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct WeekdaySet(u8);

impl WeekdaySet {
    pub const EMPTY: Self = Self(0);
    pub const ALL: Self = Self(0b111_1111);
    pub const WEEKEND: Self = Self(0b100_0001);

    /// Builds a set from its persisted bitset, rejecting bits above Saturday.
    pub fn from_bits(bits: i64) -> Result<Self, CoreError> {
        if !(0..=i64::from(Self::ALL.0)).contains(&bits) {
            return Err(CoreError::InvalidPattern(format!(
                "weekday bitset {} is outside 0..=127",
                bits
            )));
        }
        Ok(Self(bits as u8))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, day: Weekday) -> bool {
        self.0 & (1 << weekday_index(day)) != 0
    }

    pub fn insert(&mut self, day: Weekday) {
        self.0 |= 1 << weekday_index(day);
    }

    pub fn with(mut self, day: Weekday) -> Self {
        self.insert(day);
        self
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every day of the week is in the set.
    pub fn is_full(self) -> bool {
        self.0 == Self::ALL.0
    }

    /// Iterates the members in Sunday-first order.
    pub fn iter(self) -> impl Iterator<Item = Weekday> {
        (0u8..7)
            .filter(move |index| self.0 & (1 << index) != 0)
            .filter_map(weekday_from_index)
    }
}

impl TryFrom<u8> for WeekdaySet {
    type Error = CoreError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Self::from_bits(i64::from(bits))
    }
}

impl From<WeekdaySet> for u8 {
    fn from(set: WeekdaySet) -> Self {
        set.0
    }
}

impl FromIterator<Weekday> for WeekdaySet {
    fn from_iter<I: IntoIterator<Item = Weekday>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, WeekdaySet::with)
    }
}

impl fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self
            .iter()
            .map(|day| day.to_string().to_lowercase())
            .collect();
        write!(f, "{}", names.join(","))
    }
}

impl FromStr for WeekdaySet {
    type Err = CoreError;

    /// Parses a comma separated list such as `sat,sun` or `Monday, Friday`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<Weekday>()
                    .map_err(|_| CoreError::InvalidInput(format!("Unknown weekday '{}'", part)))
            })
            .collect()
    }
}

/// Day-of-month rule for monthly patterns. Persisted as `1..=31`, or `-1` for the last day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum DayOfMonth {
    Day(u8),
    Last,
}

impl DayOfMonth {
    pub const LAST_SENTINEL: i8 = -1;

    pub fn day(day: u8) -> Result<Self, CoreError> {
        if (1..=31).contains(&day) {
            Ok(DayOfMonth::Day(day))
        } else {
            Err(CoreError::InvalidPattern(format!(
                "day of month must be 1..=31 or last, got {}",
                day
            )))
        }
    }
}

impl TryFrom<i64> for DayOfMonth {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value == i64::from(Self::LAST_SENTINEL) {
            return Ok(DayOfMonth::Last);
        }
        u8::try_from(value)
            .map_err(|_| {
                CoreError::InvalidPattern(format!("day of month {} is out of range", value))
            })
            .and_then(DayOfMonth::day)
    }
}

impl TryFrom<i8> for DayOfMonth {
    type Error = CoreError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Self::try_from(i64::from(value))
    }
}

impl From<DayOfMonth> for i8 {
    fn from(day: DayOfMonth) -> Self {
        match day {
            DayOfMonth::Day(d) => d as i8,
            DayOfMonth::Last => DayOfMonth::LAST_SENTINEL,
        }
    }
}

impl fmt::Display for DayOfMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayOfMonth::Day(d) => write!(f, "{}", d),
            DayOfMonth::Last => write!(f, "last"),
        }
    }
}

impl FromStr for DayOfMonth {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("last") {
            return Ok(DayOfMonth::Last);
        }
        let value: i64 = trimmed
            .parse()
            .map_err(|_| CoreError::InvalidInput(format!("Invalid day of month '{}'", s)))?;
        Self::try_from(value)
    }
}

/// Recurrence rule shared by every occurrence of one recurrence group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrencePattern {
    pub kind: RecurrenceKind,
    pub interval_unit: IntervalUnit,
    /// 0 means one-time: no further occurrences are ever generated
    pub interval_value: u32,
    /// Calendar anchor, required for fixed schedules and ignored otherwise
    pub anchor_date: Option<DateTime<Utc>>,
    /// Only applied when resolving fixed schedules
    pub excluded_weekdays: WeekdaySet,
    /// Monthly patterns only
    pub day_of_month: Option<DayOfMonth>,
    pub end_date: Option<DateTime<Utc>>,
    pub max_occurrence_count: Option<u32>,
    pub next_due_date: Option<DateTime<Utc>>,
    pub last_generated_at: Option<DateTime<Utc>>,
    /// Occurrences created so far in the group, the first one included
    pub generated_count: u32,
}

impl RecurrencePattern {
    fn with_kind(
        kind: RecurrenceKind,
        unit: IntervalUnit,
        value: u32,
        anchor_date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            kind,
            interval_unit: unit,
            interval_value: value,
            anchor_date,
            excluded_weekdays: WeekdaySet::EMPTY,
            day_of_month: None,
            end_date: None,
            max_occurrence_count: None,
            next_due_date: None,
            last_generated_at: None,
            generated_count: 0,
        }
    }

    pub fn fixed_schedule(unit: IntervalUnit, value: u32, anchor: DateTime<Utc>) -> Self {
        Self::with_kind(RecurrenceKind::FixedSchedule, unit, value, Some(anchor))
    }

    pub fn after_completion(unit: IntervalUnit, value: u32) -> Self {
        Self::with_kind(RecurrenceKind::AfterCompletion, unit, value, None)
    }

    pub fn excluding(mut self, weekdays: WeekdaySet) -> Self {
        self.excluded_weekdays = weekdays;
        self
    }

    pub fn on_day_of_month(mut self, day: DayOfMonth) -> Self {
        self.day_of_month = Some(day);
        self
    }

    pub fn ending_at(mut self, end_date: DateTime<Utc>) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn limited_to(mut self, max_occurrences: u32) -> Self {
        self.max_occurrence_count = Some(max_occurrences);
        self
    }

    #[inline]
    pub fn is_one_time(&self) -> bool {
        self.interval_value == 0
    }

    /// True once `max_occurrence_count` occurrences have been generated.
    #[inline]
    pub fn is_count_exhausted(&self) -> bool {
        self.max_occurrence_count
            .is_some_and(|max| self.generated_count >= max)
    }

    /// Checks the structural invariants of the pattern.
    ///
    /// Rejects fixed schedules without an anchor, exclusion of all seven weekdays,
    /// day-of-month rules on non-monthly patterns and a zero occurrence limit.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.kind == RecurrenceKind::FixedSchedule && self.anchor_date.is_none() {
            return Err(CoreError::InvalidPattern(
                "a fixed schedule requires an anchor date".to_string(),
            ));
        }
        if self.excluded_weekdays.is_full() {
            return Err(CoreError::InvalidPattern(
                "excluded weekdays cover the whole week".to_string(),
            ));
        }
        if self.day_of_month.is_some() && self.interval_unit != IntervalUnit::Months {
            return Err(CoreError::InvalidPattern(format!(
                "day of month only applies to monthly patterns, not {}",
                self.interval_unit
            )));
        }
        if self.max_occurrence_count == Some(0) {
            return Err(CoreError::InvalidPattern(
                "maximum occurrence count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Converts a raw, possibly negative interval into the stored representation.
    pub fn interval_from_raw(value: i64) -> Result<u32, CoreError> {
        if value < 0 {
            return Err(CoreError::InvalidPattern(format!(
                "interval must not be negative, got {}",
                value
            )));
        }
        u32::try_from(value)
            .map_err(|_| CoreError::InvalidPattern(format!("interval {} is too large", value)))
    }
}

// ============================================================================
// Occurrences
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    Ready,
    InProgress,
    Blocked,
    Completed,
    Archived,
}

impl OccurrenceStatus {
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, OccurrenceStatus::Completed | OccurrenceStatus::Archived)
    }

    /// Non-terminal states move freely among themselves and into either terminal state.
    pub fn can_transition_to(self, to: OccurrenceStatus) -> bool {
        !self.is_terminal() && self != to
    }
}

impl fmt::Display for OccurrenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OccurrenceStatus::Ready => write!(f, "ready"),
            OccurrenceStatus::InProgress => write!(f, "in_progress"),
            OccurrenceStatus::Blocked => write!(f, "blocked"),
            OccurrenceStatus::Completed => write!(f, "completed"),
            OccurrenceStatus::Archived => write!(f, "archived"),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
#[error("Invalid occurrence status: {0}")]
pub struct ParseOccurrenceStatusError(String);

impl FromStr for OccurrenceStatus {
    type Err = ParseOccurrenceStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "ready" => Ok(OccurrenceStatus::Ready),
            "in_progress" => Ok(OccurrenceStatus::InProgress),
            "blocked" => Ok(OccurrenceStatus::Blocked),
            "completed" => Ok(OccurrenceStatus::Completed),
            "archived" => Ok(OccurrenceStatus::Archived),
            _ => Err(ParseOccurrenceStatusError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default, sqlx::Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    #[default]
    Task,
    Habit,
    /// Open-ended task that is periodically nudged for re-review
    Someday,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Task => write!(f, "task"),
            TaskKind::Habit => write!(f, "habit"),
            TaskKind::Someday => write!(f, "someday"),
        }
    }
}

/// Habit settings attached to habit-type templates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HabitConfig {
    /// Weekdays on which the habit is due; empty means daily
    pub schedule_days: WeekdaySet,
    /// Days that may be missed without breaking the streak
    pub grace_period_days: u32,
}

impl HabitConfig {
    pub fn daily(grace_period_days: u32) -> Self {
        Self {
            schedule_days: WeekdaySet::EMPTY,
            grace_period_days,
        }
    }

    pub fn is_scheduled_on(&self, date: NaiveDate) -> bool {
        self.schedule_days.is_empty() || self.schedule_days.contains(date.weekday())
    }
}

/// Immutable descriptive fields captured once per recurrence group and
/// re-stamped onto every occurrence the group spawns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccurrenceTemplate {
    pub title: String,
    pub description: Option<String>,
    #[serde(default)]
    pub kind: TaskKind,
    pub parent_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub estimated_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub habit: Option<HabitConfig>,
}

impl OccurrenceTemplate {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            kind: TaskKind::Task,
            parent_id: None,
            tags: Vec::new(),
            estimated_minutes: None,
            habit: None,
        }
    }

    pub fn habit(title: impl Into<String>, config: HabitConfig) -> Self {
        Self {
            kind: TaskKind::Habit,
            habit: Some(config),
            ..Self::new(title)
        }
    }

    /// Stamps a fresh `Ready` occurrence from this template.
    pub fn instantiate(
        &self,
        group_id: Option<Uuid>,
        due_date: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> TaskOccurrence {
        TaskOccurrence {
            id: Uuid::now_v7(),
            group_id,
            status: OccurrenceStatus::Ready,
            due_date,
            completed_at: None,
            completed_count: 0,
            snapshot: self.clone(),
            created_at: now,
            updated_at: now,
            last_nudge_at: None,
            nudge_count: 0,
        }
    }
}

/// One concrete instance of a (possibly recurring) task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOccurrence {
    pub id: Uuid,
    /// Stable across regenerations; `None` for non-recurring tasks
    pub group_id: Option<Uuid>,
    pub status: OccurrenceStatus,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_count: u32,
    pub snapshot: OccurrenceTemplate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_nudge_at: Option<DateTime<Utc>>,
    pub nudge_count: u32,
}

impl TaskOccurrence {
    #[inline]
    pub fn title(&self) -> &str {
        &self.snapshot.title
    }

    #[inline]
    pub fn kind(&self) -> TaskKind {
        self.snapshot.kind
    }

    #[inline]
    pub fn is_recurring(&self) -> bool {
        self.group_id.is_some()
    }
}

/// Data for a one-time task created outside any recurrence group.
#[derive(Debug, Clone)]
pub struct NewOccurrenceData {
    pub template: OccurrenceTemplate,
    pub due_date: Option<DateTime<Utc>>,
}

// ============================================================================
// Recurrence Groups
// ============================================================================

/// A recurrence pattern together with the template its occurrences are stamped from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceGroup {
    pub id: Uuid,
    pub pattern: RecurrencePattern,
    pub template: OccurrenceTemplate,
    pub created_at: DateTime<Utc>,
}

impl RecurrenceGroup {
    /// Grace period of the group's habit config, if it has one.
    pub fn grace_period_days(&self) -> Option<u32> {
        self.template.habit.map(|habit| habit.grace_period_days)
    }
}

/// Raw input for creating a recurrence group, validated by [`NewRecurrenceData::to_pattern`].
#[derive(Debug, Clone)]
pub struct NewRecurrenceData {
    pub template: OccurrenceTemplate,
    pub kind: RecurrenceKind,
    pub interval_unit: IntervalUnit,
    /// May arrive negative from user input and is rejected then
    pub interval_value: i64,
    pub anchor_date: Option<DateTime<Utc>>,
    pub excluded_weekdays: WeekdaySet,
    pub day_of_month: Option<DayOfMonth>,
    pub end_date: Option<DateTime<Utc>>,
    pub max_occurrence_count: Option<u32>,
    /// Due date of the first occurrence of an after-completion group
    pub first_due: Option<DateTime<Utc>>,
}

impl NewRecurrenceData {
    pub fn to_pattern(&self) -> Result<RecurrencePattern, CoreError> {
        let pattern = RecurrencePattern {
            kind: self.kind,
            interval_unit: self.interval_unit,
            interval_value: RecurrencePattern::interval_from_raw(self.interval_value)?,
            anchor_date: self.anchor_date,
            excluded_weekdays: self.excluded_weekdays,
            day_of_month: self.day_of_month,
            end_date: self.end_date,
            max_occurrence_count: self.max_occurrence_count,
            next_due_date: None,
            last_generated_at: None,
            generated_count: 0,
        };
        pattern.validate()?;
        Ok(pattern)
    }
}

// ============================================================================
// Completions and Streaks
// ============================================================================

/// Caller-supplied details of a completion event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionRequest {
    pub completed_at: DateTime<Utc>,
    pub is_retroactive: bool,
}

impl CompletionRequest {
    pub fn at(completed_at: DateTime<Utc>) -> Self {
        Self {
            completed_at,
            is_retroactive: false,
        }
    }

    pub fn retroactive(completed_at: DateTime<Utc>) -> Self {
        Self {
            completed_at,
            is_retroactive: true,
        }
    }
}

/// Append-only record of one completion. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct CompletionRecord {
    pub id: Uuid,
    pub group_id: Option<Uuid>,
    pub occurrence_id: Uuid,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: DateTime<Utc>,
    pub was_late: bool,
    pub was_retroactive: bool,
}

impl CompletionRecord {
    pub fn for_occurrence(occurrence: &TaskOccurrence, request: CompletionRequest) -> Self {
        Self {
            id: Uuid::now_v7(),
            group_id: occurrence.group_id,
            occurrence_id: occurrence.id,
            due_date: occurrence.due_date,
            completed_at: request.completed_at,
            was_late: occurrence
                .due_date
                .is_some_and(|due| request.completed_at > due),
            was_retroactive: request.is_retroactive,
        }
    }
}

/// Derived habit state; never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreakState {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub is_completed_today: bool,
    /// `None` when there is no completion on or before today
    pub days_since_last_completion: Option<i64>,
}

// ============================================================================
// Engine Configuration
// ============================================================================

/// Settings the engine needs from its host; the library never reads them from the environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Timezone that defines calendar days for streaks
    pub timezone: Tz,
    pub nudge: NudgePolicy,
    /// Grace period for habit groups without a habit config
    pub default_grace_period_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            nudge: NudgePolicy::default(),
            default_grace_period_days: 0,
        }
    }
}
