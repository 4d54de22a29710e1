use anyhow::{anyhow, Result};
use cadence_core::engine::HabitEngine;
use cadence_core::models::{CompletionRequest, TaskKind};
use cadence_core::repository::Repository;
use chrono::{DateTime, Utc};
use owo_colors::{OwoColorize, Style};

use crate::cli::DoneCommand;
use crate::parser::parse_date;
use crate::util::resolve_occurrence;

pub async fn complete_occurrence(
    engine: &HabitEngine<impl Repository>,
    command: DoneCommand,
    now: DateTime<Utc>,
) -> Result<()> {
    let timezone = engine.config().timezone;
    let occurrence = resolve_occurrence(engine.repository(), &command.id).await?;

    let request = match command.at.as_deref() {
        Some(at) => {
            let completed_at = parse_date(at, now, &timezone)?;
            if completed_at > now {
                return Err(anyhow!("Completion time '{}' lies in the future", at));
            }
            CompletionRequest::retroactive(completed_at)
        }
        None => CompletionRequest::at(now),
    };

    let write_set = engine
        .complete_occurrence(occurrence.id, request, now)
        .await?;

    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();

    println!(
        "{} Completed: {}",
        "✓".style(success_style),
        write_set.completed.title().bright_white().bold()
    );
    if write_set.record.was_late {
        println!("  {} Completed after its due date", "!".yellow());
    }

    match &write_set.new_occurrence {
        Some(next) => {
            println!("Next ID: {}", next.id);
            if let Some(due) = next.due_date {
                println!(
                    "  {} Next due: {}",
                    "→".style(info_style),
                    due.with_timezone(&timezone)
                        .format("%Y-%m-%d %H:%M %Z")
                        .to_string()
                        .cyan()
                );
            }
        }
        None if occurrence.is_recurring() => {
            println!("  {} Recurrence finished; no further occurrences", "→".style(info_style));
        }
        None => {}
    }

    if let (TaskKind::Habit, Some(group_id)) = (occurrence.kind(), occurrence.group_id) {
        let streak = engine.compute_streak(group_id, now).await?;
        println!(
            "  {} Streak: {} (longest {})",
            "🔥".style(info_style),
            streak.current_streak.to_string().green().bold(),
            streak.longest_streak
        );
    }

    Ok(())
}
