use anyhow::Result;
use cadence_core::engine::HabitEngine;
use cadence_core::repository::Repository;
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;

use crate::cli::ReviewCommand;
use crate::views::table::display_review;

pub async fn review(
    engine: &HabitEngine<impl Repository>,
    command: ReviewCommand,
    now: DateTime<Utc>,
) -> Result<()> {
    let due = engine.due_for_review(now).await?;
    let rows: Vec<_> = due
        .into_iter()
        .map(|task| {
            let suggest_archive = engine.should_suggest_archive(&task);
            (task, suggest_archive)
        })
        .collect();

    display_review(&rows, &engine.config().timezone);

    if command.ack && !rows.is_empty() {
        for (task, _) in &rows {
            engine.record_nudge(task.id, now).await?;
        }
        println!(
            "{}",
            format!("Recorded review of {} task(s)", rows.len()).bright_black()
        );
    }
    Ok(())
}
