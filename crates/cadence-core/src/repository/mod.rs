use crate::db::DbPool;
use crate::error::CoreError;
use crate::generator::WriteSet;
use crate::ledger::CompletionLedger;
use crate::models::{
    DayOfMonth, IntervalUnit, OccurrenceStatus, OccurrenceTemplate, RecurrenceGroup,
    RecurrenceKind, RecurrencePattern, TaskKind, TaskOccurrence, WeekdaySet,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

pub mod completions;
pub mod groups;
pub mod occurrences;

// Traits are defined in this module and implemented in respective domain modules

/// Which occurrences a listing returns.
#[derive(Debug, Clone, Default)]
pub struct OccurrenceFilter {
    /// Include `Completed` and `Archived` occurrences
    pub include_closed: bool,
    pub kind: Option<TaskKind>,
    pub group_id: Option<Uuid>,
}

impl OccurrenceFilter {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn of_kind(kind: TaskKind) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }
}

/// Domain-specific trait for occurrence operations
#[async_trait]
pub trait OccurrenceRepository {
    async fn add_occurrence(&self, occurrence: &TaskOccurrence) -> Result<(), CoreError>;
    async fn load_occurrence(&self, id: Uuid) -> Result<Option<TaskOccurrence>, CoreError>;
    async fn find_occurrences_by_short_id_prefix(
        &self,
        short_id: &str,
    ) -> Result<Vec<TaskOccurrence>, CoreError>;
    async fn find_occurrences(
        &self,
        filter: &OccurrenceFilter,
    ) -> Result<Vec<TaskOccurrence>, CoreError>;
    /// Persists status and nudge bookkeeping, provided the stored status still equals `expected`.
    async fn update_occurrence_state(
        &self,
        occurrence: &TaskOccurrence,
        expected: OccurrenceStatus,
    ) -> Result<(), CoreError>;
}

/// Domain-specific trait for recurrence group operations
#[async_trait]
pub trait GroupRepository {
    /// Stores a new group together with its first occurrence.
    async fn insert_group(
        &self,
        group: &RecurrenceGroup,
        first: &TaskOccurrence,
    ) -> Result<(), CoreError>;
    async fn load_group(&self, id: Uuid) -> Result<Option<RecurrenceGroup>, CoreError>;
    async fn find_groups(&self) -> Result<Vec<RecurrenceGroup>, CoreError>;
}

/// Commits a completion write-set.
#[async_trait]
pub trait WriteSetRepository {
    /// Applies every part of `write_set` in one transaction, or nothing.
    ///
    /// # Errors
    /// * `AlreadyCompleted` - another completion of the same occurrence committed first
    /// * `InvalidTransition` - the occurrence was archived in the meantime
    /// * `NotFound` - the occurrence does not exist
    async fn apply(&self, write_set: &WriteSet) -> Result<(), CoreError>;
}

/// Main repository trait that composes all domain traits
pub trait Repository:
    OccurrenceRepository + GroupRepository + CompletionLedger + WriteSetRepository + Send + Sync
{
}

/// SQLite implementation of the repository pattern
pub struct SqliteRepository {
    pool: DbPool,
}

impl SqliteRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the database pool for internal use across modules
    pub(crate) fn pool(&self) -> &DbPool {
        &self.pool
    }
}

impl Repository for SqliteRepository {}

// ============================================================================
// Row mapping
// ============================================================================

pub(crate) const OCCURRENCE_COLUMNS: &str = "id, group_id, status, due_date, completed_at, \
     completed_count, snapshot, created_at, updated_at, last_nudge_at, nudge_count";

pub(crate) const GROUP_COLUMNS: &str = "id, kind, interval_unit, interval_value, anchor_date, \
     excluded_weekdays, day_of_month, end_date, max_occurrence_count, next_due_date, \
     last_generated_at, generated_count, template, created_at";

#[derive(Debug, FromRow)]
pub(crate) struct OccurrenceRow {
    id: Uuid,
    group_id: Option<Uuid>,
    status: OccurrenceStatus,
    due_date: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    completed_count: i64,
    snapshot: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_nudge_at: Option<DateTime<Utc>>,
    nudge_count: i64,
}

impl TryFrom<OccurrenceRow> for TaskOccurrence {
    type Error = CoreError;

    fn try_from(row: OccurrenceRow) -> Result<Self, Self::Error> {
        let snapshot: OccurrenceTemplate = serde_json::from_str(&row.snapshot)?;
        Ok(TaskOccurrence {
            id: row.id,
            group_id: row.group_id,
            status: row.status,
            due_date: row.due_date,
            completed_at: row.completed_at,
            completed_count: counter_from_db(row.completed_count, "completed_count")?,
            snapshot,
            created_at: row.created_at,
            updated_at: row.updated_at,
            last_nudge_at: row.last_nudge_at,
            nudge_count: counter_from_db(row.nudge_count, "nudge_count")?,
        })
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct GroupRow {
    id: Uuid,
    kind: RecurrenceKind,
    interval_unit: IntervalUnit,
    interval_value: i64,
    anchor_date: Option<DateTime<Utc>>,
    excluded_weekdays: i64,
    day_of_month: Option<i64>,
    end_date: Option<DateTime<Utc>>,
    max_occurrence_count: Option<i64>,
    next_due_date: Option<DateTime<Utc>>,
    last_generated_at: Option<DateTime<Utc>>,
    generated_count: i64,
    template: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<GroupRow> for RecurrenceGroup {
    type Error = CoreError;

    fn try_from(row: GroupRow) -> Result<Self, Self::Error> {
        let pattern = RecurrencePattern {
            kind: row.kind,
            interval_unit: row.interval_unit,
            interval_value: RecurrencePattern::interval_from_raw(row.interval_value)?,
            anchor_date: row.anchor_date,
            excluded_weekdays: WeekdaySet::from_bits(row.excluded_weekdays)?,
            day_of_month: row.day_of_month.map(DayOfMonth::try_from).transpose()?,
            end_date: row.end_date,
            max_occurrence_count: row
                .max_occurrence_count
                .map(|max| counter_from_db(max, "max_occurrence_count"))
                .transpose()?,
            next_due_date: row.next_due_date,
            last_generated_at: row.last_generated_at,
            generated_count: counter_from_db(row.generated_count, "generated_count")?,
        };

        Ok(RecurrenceGroup {
            id: row.id,
            pattern,
            template: serde_json::from_str(&row.template)?,
            created_at: row.created_at,
        })
    }
}

fn counter_from_db(value: i64, column: &str) -> Result<u32, CoreError> {
    u32::try_from(value).map_err(|_| {
        CoreError::InvalidInput(format!("{} holds out-of-range value {}", column, value))
    })
}
