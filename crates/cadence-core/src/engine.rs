//! Service facade tying the pure engine to a persistence collaborator.
//!
//! Every operation takes `now` explicitly; the engine never reads the wall clock.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::calendar::calendar_day;
use crate::error::CoreError;
use crate::generator::{self, WriteSet};
use crate::ledger::CompletionLedger;
use crate::models::{
    CompletionRequest, EngineConfig, NewOccurrenceData, NewRecurrenceData, OccurrenceStatus,
    RecurrenceGroup, RecurrencePattern, StreakState, TaskKind, TaskOccurrence,
};
use crate::nudge;
use crate::recurrence::RecurrenceResolver;
use crate::repository::{
    GroupRepository, OccurrenceFilter, OccurrenceRepository, Repository, WriteSetRepository,
};
use crate::streak::StreakCalculator;

pub struct HabitEngine<R: Repository> {
    repository: R,
    config: EngineConfig,
}

impl<R: Repository> HabitEngine<R> {
    pub fn new(repository: R, config: EngineConfig) -> Self {
        Self { repository, config }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Calendar day of `now` in the configured timezone.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        calendar_day(now, &self.config.timezone)
    }

    /// Creates a one-time task outside any recurrence group.
    pub async fn create_task(
        &self,
        data: NewOccurrenceData,
        now: DateTime<Utc>,
    ) -> Result<TaskOccurrence, CoreError> {
        if data.template.title.trim().is_empty() {
            return Err(CoreError::InvalidInput("Title must not be empty".to_string()));
        }
        let occurrence = data.template.instantiate(None, data.due_date, now);
        self.repository.add_occurrence(&occurrence).await?;
        debug!(occurrence_id = %occurrence.id, "created task");
        Ok(occurrence)
    }

    /// Validates a recurrence configuration and stores it with its first occurrence.
    ///
    /// # Errors
    /// `InvalidPattern` for a pattern that breaks its invariants or that can never
    /// produce an occurrence (for example an end date before the first due date).
    pub async fn create_group(
        &self,
        data: NewRecurrenceData,
        now: DateTime<Utc>,
    ) -> Result<(RecurrenceGroup, TaskOccurrence), CoreError> {
        if data.template.title.trim().is_empty() {
            return Err(CoreError::InvalidInput("Title must not be empty".to_string()));
        }

        let mut pattern = data.to_pattern()?;
        let first_due = RecurrenceResolver::new(&pattern)?
            .first_due(data.first_due, now)?
            .ok_or_else(|| {
                CoreError::InvalidPattern("the pattern never produces an occurrence".to_string())
            })?;

        // One-time patterns never carry a next due date
        if !pattern.is_one_time() {
            pattern.next_due_date = Some(first_due);
        }
        pattern.last_generated_at = Some(now);
        pattern.generated_count = 1;

        let group = RecurrenceGroup {
            id: Uuid::now_v7(),
            pattern,
            template: data.template,
            created_at: now,
        };
        let first = group.template.instantiate(Some(group.id), Some(first_due), now);

        self.repository.insert_group(&group, &first).await?;
        info!(group_id = %group.id, %first_due, "created recurrence group");
        Ok((group, first))
    }

    /// Completes an occurrence and commits the resulting write-set atomically.
    ///
    /// Safe to retry: a second completion of the same occurrence fails with
    /// `AlreadyCompleted` and commits nothing.
    pub async fn complete_occurrence(
        &self,
        id: Uuid,
        request: CompletionRequest,
        now: DateTime<Utc>,
    ) -> Result<WriteSet, CoreError> {
        let occurrence = self.load_occurrence(id).await?;
        let group = match occurrence.group_id {
            Some(group_id) => Some(self.load_group(group_id).await?),
            None => None,
        };

        let write_set =
            generator::on_occurrence_completed(&occurrence, group.as_ref(), request, now)?;
        self.repository.apply(&write_set).await?;

        info!(
            occurrence_id = %id,
            was_late = write_set.record.was_late,
            next_due = ?write_set.new_occurrence.as_ref().and_then(|next| next.due_date),
            "completed occurrence"
        );
        Ok(write_set)
    }

    /// Moves an occurrence to a non-completing status.
    pub async fn set_status(
        &self,
        id: Uuid,
        to: OccurrenceStatus,
        now: DateTime<Utc>,
    ) -> Result<TaskOccurrence, CoreError> {
        let occurrence = self.load_occurrence(id).await?;
        let updated = generator::transition(&occurrence, to, now)?;
        self.repository
            .update_occurrence_state(&updated, occurrence.status)
            .await?;
        debug!(occurrence_id = %id, from = %occurrence.status, %to, "status changed");
        Ok(updated)
    }

    /// Streak state of a recurrence group as of `now`.
    ///
    /// The grace period comes from the group's habit config, falling back to the
    /// configured default.
    pub async fn compute_streak(
        &self,
        group_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<StreakState, CoreError> {
        let group = self.load_group(group_id).await?;
        let records = self.repository.query(group_id).await?;
        let grace = group
            .grace_period_days()
            .unwrap_or(self.config.default_grace_period_days);

        Ok(StreakCalculator::new(self.config.timezone).compute(&records, grace, self.today(now)))
    }

    /// Upcoming due dates of an arbitrary pattern, for configuration previews.
    pub fn preview_next_occurrences(
        &self,
        pattern: &RecurrencePattern,
        from: DateTime<Utc>,
        count: usize,
    ) -> Result<Vec<DateTime<Utc>>, CoreError> {
        RecurrenceResolver::new(pattern)?.preview(from, count)
    }

    /// Upcoming due dates of a stored group, starting with its open occurrence.
    ///
    /// A group without an open occurrence (exhausted, or its last occurrence archived)
    /// has nothing upcoming.
    pub async fn preview_group(
        &self,
        group_id: Uuid,
        count: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>, CoreError> {
        let group = self.load_group(group_id).await?;
        let open = self
            .repository
            .find_occurrences(&OccurrenceFilter {
                group_id: Some(group_id),
                ..OccurrenceFilter::open()
            })
            .await?;
        if open.is_empty() || count == 0 {
            return Ok(Vec::new());
        }
        let Some(pending) = open.iter().filter_map(|occurrence| occurrence.due_date).min() else {
            return self.preview_next_occurrences(&group.pattern, now, count);
        };

        // The pending occurrence is already counted in generated_count
        let mut dates = vec![pending];
        dates.extend(self.preview_next_occurrences(&group.pattern, pending, count - 1)?);
        Ok(dates)
    }

    /// Open someday tasks whose review interval has elapsed.
    pub async fn due_for_review(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskOccurrence>, CoreError> {
        let policy = self.config.nudge;
        let candidates = self
            .repository
            .find_occurrences(&OccurrenceFilter::of_kind(TaskKind::Someday))
            .await?;
        Ok(candidates
            .into_iter()
            .filter(|task| policy.is_due_for_review(task, now))
            .collect())
    }

    /// Records that the user was nudged about `id`.
    pub async fn record_nudge(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TaskOccurrence, CoreError> {
        let mut occurrence = self.load_occurrence(id).await?;
        if occurrence.status.is_terminal() {
            return Err(CoreError::InvalidInput(format!(
                "Occurrence {} is {} and no longer reviewed",
                id, occurrence.status
            )));
        }
        let status = occurrence.status;
        nudge::record_nudge(&mut occurrence, now);
        self.repository
            .update_occurrence_state(&occurrence, status)
            .await?;
        Ok(occurrence)
    }

    pub fn should_suggest_archive(&self, task: &TaskOccurrence) -> bool {
        self.config.nudge.should_suggest_archive(task)
    }

    async fn load_occurrence(&self, id: Uuid) -> Result<TaskOccurrence, CoreError> {
        self.repository
            .load_occurrence(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Occurrence {} not found", id)))
    }

    async fn load_group(&self, id: Uuid) -> Result<RecurrenceGroup, CoreError> {
        self.repository
            .load_group(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("Recurrence group {} not found", id)))
    }
}
