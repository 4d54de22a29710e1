use anyhow::Result;
use cadence_core::engine::HabitEngine;
use cadence_core::repository::{OccurrenceFilter, OccurrenceRepository, Repository};
use chrono::{DateTime, Utc};

use crate::cli::ListCommand;
use crate::views::table::display_occurrences;

pub async fn list_occurrences(
    engine: &HabitEngine<impl Repository>,
    command: ListCommand,
    now: DateTime<Utc>,
) -> Result<()> {
    let filter = OccurrenceFilter {
        include_closed: command.all,
        kind: command.kind.map(Into::into),
        group_id: None,
    };

    let occurrences = engine.repository().find_occurrences(&filter).await?;
    display_occurrences(&occurrences, now, &engine.config().timezone);

    Ok(())
}
