//! Turns a completion event into the write-set a persistence collaborator commits atomically.
//!
//! Nothing here performs I/O. The returned [`WriteSet`] holds every side effect of the
//! completion; applying it partially is never acceptable.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::CoreError;
use crate::models::{
    CompletionRecord, CompletionRequest, OccurrenceStatus, RecurrenceGroup, RecurrencePattern,
    TaskOccurrence,
};
use crate::recurrence::RecurrenceResolver;

/// Everything one completion changes, committed as a single transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSet {
    /// The occurrence, now `Completed`
    pub completed: TaskOccurrence,
    /// Ledger entry to append
    pub record: CompletionRecord,
    /// Next occurrence of the group, when the pattern permits one
    pub new_occurrence: Option<TaskOccurrence>,
    /// Pattern with its next-due pointer advanced, present iff `new_occurrence` is
    pub updated_pattern: Option<RecurrencePattern>,
}

impl WriteSet {
    #[inline]
    pub fn group_id(&self) -> Option<Uuid> {
        self.completed.group_id
    }

    #[inline]
    pub fn spawned_next(&self) -> bool {
        self.new_occurrence.is_some()
    }
}

/// Completes `occurrence` and, when its group's pattern allows, spawns the next occurrence.
///
/// # Arguments
/// * `occurrence` - The occurrence being completed
/// * `group` - Its recurrence group; `None` for one-time tasks
/// * `request` - Completion timestamp and retroactive flag
/// * `now` - Generation time, also the reference point for fixed schedules
///
/// # Errors
/// * `AlreadyCompleted` - the occurrence is already `Completed` (duplicate or retried event)
/// * `InvalidTransition` - the occurrence is `Archived`
/// * `InvalidPattern` - the group's pattern violates its invariants
/// * `InvalidInput` - `group` is not the occurrence's group
pub fn on_occurrence_completed(
    occurrence: &TaskOccurrence,
    group: Option<&RecurrenceGroup>,
    request: CompletionRequest,
    now: DateTime<Utc>,
) -> Result<WriteSet, CoreError> {
    if occurrence.status == OccurrenceStatus::Completed {
        warn!(occurrence_id = %occurrence.id, "rejected duplicate completion");
        return Err(CoreError::AlreadyCompleted(occurrence.id));
    }
    if !occurrence.status.can_transition_to(OccurrenceStatus::Completed) {
        return Err(CoreError::InvalidTransition {
            from: occurrence.status,
            to: OccurrenceStatus::Completed,
        });
    }

    let resolver = match group {
        Some(group) => {
            if occurrence.group_id != Some(group.id) {
                return Err(CoreError::InvalidInput(format!(
                    "Occurrence {} does not belong to recurrence group {}",
                    occurrence.id, group.id
                )));
            }
            Some(RecurrenceResolver::new(&group.pattern)?)
        }
        None => None,
    };

    let mut completed = occurrence.clone();
    completed.status = OccurrenceStatus::Completed;
    completed.completed_at = Some(request.completed_at);
    completed.completed_count = completed.completed_count.saturating_add(1);
    completed.updated_at = now;

    let record = CompletionRecord::for_occurrence(occurrence, request);

    let mut write_set = WriteSet {
        completed,
        record,
        new_occurrence: None,
        updated_pattern: None,
    };

    let (Some(group), Some(resolver)) = (group, resolver) else {
        return Ok(write_set);
    };

    match resolver.next_due(request.completed_at, now)? {
        Some(next_due) => {
            let next = group.template.instantiate(Some(group.id), Some(next_due), now);

            let mut pattern = group.pattern.clone();
            pattern.next_due_date = Some(next_due);
            pattern.last_generated_at = Some(now);
            pattern.generated_count = pattern.generated_count.saturating_add(1);

            debug!(group_id = %group.id, %next_due, next_id = %next.id, "spawning next occurrence");
            write_set.new_occurrence = Some(next);
            write_set.updated_pattern = Some(pattern);
        }
        None => {
            debug!(group_id = %group.id, "recurrence produced no further occurrence");
        }
    }

    Ok(write_set)
}

/// Moves an occurrence between non-completing states
/// (`Ready`, `InProgress`, `Blocked`, `Archived`).
///
/// Completion goes through [`on_occurrence_completed`] so that it always produces a ledger entry.
pub fn transition(
    occurrence: &TaskOccurrence,
    to: OccurrenceStatus,
    now: DateTime<Utc>,
) -> Result<TaskOccurrence, CoreError> {
    if to == OccurrenceStatus::Completed {
        return Err(CoreError::InvalidInput(
            "Occurrences are completed through a completion event".to_string(),
        ));
    }
    if !occurrence.status.can_transition_to(to) {
        return Err(CoreError::InvalidTransition {
            from: occurrence.status,
            to,
        });
    }

    let mut updated = occurrence.clone();
    updated.status = to;
    updated.updated_at = now;
    Ok(updated)
}
