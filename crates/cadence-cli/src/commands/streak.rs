use anyhow::{anyhow, Result};
use cadence_core::engine::HabitEngine;
use cadence_core::ledger::{summarize, CompletionLedger};
use cadence_core::repository::Repository;
use chrono::{DateTime, Utc};

use crate::cli::StreakCommand;
use crate::util::resolve_occurrence;
use crate::views::table::display_streak;

pub async fn show_streak(
    engine: &HabitEngine<impl Repository>,
    command: StreakCommand,
    now: DateTime<Utc>,
) -> Result<()> {
    let occurrence = resolve_occurrence(engine.repository(), &command.id).await?;
    let group_id = occurrence.group_id.ok_or_else(|| {
        anyhow!(
            "'{}' does not recur, so it has no streak",
            occurrence.title()
        )
    })?;

    let streak = engine.compute_streak(group_id, now).await?;
    let summary = summarize(&engine.repository().query(group_id).await?);
    display_streak(occurrence.title(), &streak, &summary);
    Ok(())
}
