//! Re-review scheduling for "someday" tasks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::elapsed_days;
use crate::models::TaskOccurrence;

/// How often open-ended tasks come back for review, and when to suggest dropping them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NudgePolicy {
    pub interval_days: u32,
    pub max_nudge_count: u32,
}

impl Default for NudgePolicy {
    fn default() -> Self {
        Self {
            interval_days: 7,
            max_nudge_count: 3,
        }
    }
}

impl NudgePolicy {
    pub fn is_due_for_review(&self, task: &TaskOccurrence, now: DateTime<Utc>) -> bool {
        is_due_for_review(task, self.interval_days, now)
    }

    pub fn should_suggest_archive(&self, task: &TaskOccurrence) -> bool {
        should_suggest_archive(task, self.max_nudge_count)
    }

    /// When the task next becomes due for review.
    pub fn next_review_at(&self, task: &TaskOccurrence) -> DateTime<Utc> {
        let since = last_reviewed_at(task);
        since
            .checked_add_signed(Duration::days(i64::from(self.interval_days)))
            .unwrap_or(since)
    }
}

#[inline]
fn last_reviewed_at(task: &TaskOccurrence) -> DateTime<Utc> {
    task.last_nudge_at.unwrap_or(task.created_at)
}

/// True once `interval_days` whole days have passed since the last nudge, or since
/// creation when the task was never nudged.
pub fn is_due_for_review(task: &TaskOccurrence, interval_days: u32, now: DateTime<Utc>) -> bool {
    elapsed_days(last_reviewed_at(task), now) >= i64::from(interval_days)
}

pub fn record_nudge(task: &mut TaskOccurrence, now: DateTime<Utc>) {
    task.last_nudge_at = Some(now);
    task.nudge_count = task.nudge_count.saturating_add(1);
    task.updated_at = now;
}

pub fn should_suggest_archive(task: &TaskOccurrence, max_nudge_count: u32) -> bool {
    task.nudge_count >= max_nudge_count
}
