//! Completion ledger contract and the read-side derivations built on it.
//!
//! The ledger is append-only: there is no update or delete, which keeps every streak
//! reproducible from history alone.

use async_trait::async_trait;
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::calendar::calendar_day;
use crate::error::CoreError;
use crate::models::CompletionRecord;

#[async_trait]
pub trait CompletionLedger {
    /// Appends a record. Records are never modified afterwards.
    async fn append(&self, record: &CompletionRecord) -> Result<(), CoreError>;

    /// All records of a recurrence group, newest first.
    async fn query(&self, group_id: Uuid) -> Result<Vec<CompletionRecord>, CoreError>;
}

/// Orders records newest first; ties on `completed_at` fall back to the time-ordered id.
pub fn sort_newest_first(records: &mut [CompletionRecord]) {
    records.sort_by(|a, b| {
        b.completed_at
            .cmp(&a.completed_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

/// Distinct calendar days with at least one completion, as observed in `timezone`.
pub fn completion_days<'a, I>(records: I, timezone: &Tz) -> BTreeSet<NaiveDate>
where
    I: IntoIterator<Item = &'a CompletionRecord>,
{
    records
        .into_iter()
        .map(|record| calendar_day(record.completed_at, timezone))
        .collect()
}

/// Aggregate counts over a group's ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerSummary {
    pub total: usize,
    pub late: usize,
    pub retroactive: usize,
}

pub fn summarize(records: &[CompletionRecord]) -> LedgerSummary {
    records.iter().fold(LedgerSummary::default(), |mut summary, record| {
        summary.total += 1;
        summary.late += usize::from(record.was_late);
        summary.retroactive += usize::from(record.was_retroactive);
        summary
    })
}
