use anyhow::Result;
use cadence_core::engine::HabitEngine;
use cadence_core::models::OccurrenceStatus;
use cadence_core::repository::Repository;
use chrono::{DateTime, Utc};
use dialoguer::Confirm;

use crate::cli::{ArchiveCommand, MarkCommand};
use crate::util::resolve_occurrence;

pub async fn mark_occurrence(
    engine: &HabitEngine<impl Repository>,
    command: MarkCommand,
    now: DateTime<Utc>,
) -> Result<()> {
    let occurrence = resolve_occurrence(engine.repository(), &command.id).await?;
    let updated = engine
        .set_status(occurrence.id, command.status.into(), now)
        .await?;
    println!(
        "Marked '{}' as {}",
        updated.title(),
        updated.status.to_string().replace('_', " ")
    );
    Ok(())
}

pub async fn archive_occurrence(
    engine: &HabitEngine<impl Repository>,
    command: ArchiveCommand,
    now: DateTime<Utc>,
) -> Result<()> {
    let occurrence = resolve_occurrence(engine.repository(), &command.id).await?;

    if !command.force {
        let prompt = if occurrence.is_recurring() {
            format!(
                "Archive '{}'? The recurrence stops with it.",
                occurrence.title()
            )
        } else {
            format!("Are you sure you want to archive '{}'?", occurrence.title())
        };
        let confirmation = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false);

        if !confirmation {
            println!("Archiving cancelled.");
            return Ok(());
        }
    }

    let archived = engine
        .set_status(occurrence.id, OccurrenceStatus::Archived, now)
        .await?;
    println!("Archived '{}'", archived.title());
    Ok(())
}
