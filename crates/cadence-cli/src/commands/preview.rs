use anyhow::{anyhow, Result};
use cadence_core::engine::HabitEngine;
use cadence_core::models::OccurrenceTemplate;
use cadence_core::repository::Repository;
use chrono::{DateTime, Utc};

use crate::cli::PreviewCommand;
use crate::commands::add::recurrence_data;
use crate::util::resolve_occurrence;
use crate::views::table::display_due_dates;

/// Previews a stored recurrence by occurrence ID, or an ad-hoc one given by `--every`.
pub async fn preview(
    engine: &HabitEngine<impl Repository>,
    command: PreviewCommand,
    now: DateTime<Utc>,
) -> Result<()> {
    let timezone = engine.config().timezone;

    let dates = match command.id.as_deref() {
        Some(id) => {
            let occurrence = resolve_occurrence(engine.repository(), id).await?;
            let group_id = occurrence
                .group_id
                .ok_or_else(|| anyhow!("'{}' does not recur", occurrence.title()))?;
            engine.preview_group(group_id, command.count, now).await?
        }
        None => {
            let data = recurrence_data(
                &command.recurrence,
                OccurrenceTemplate::new("preview"),
                None,
                now,
                &timezone,
            )?
            .ok_or_else(|| anyhow!("Give an occurrence ID or a recurrence with --every"))?;
            let pattern = data.to_pattern()?;
            engine.preview_next_occurrences(&pattern, now, command.count)?
        }
    };

    display_due_dates(&dates, &timezone);
    Ok(())
}
