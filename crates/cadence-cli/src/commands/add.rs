use anyhow::{anyhow, Result};
use cadence_core::engine::HabitEngine;
use cadence_core::models::{
    DayOfMonth, HabitConfig, NewOccurrenceData, NewRecurrenceData, OccurrenceTemplate,
    RecurrenceKind, TaskKind, WeekdaySet,
};
use cadence_core::repository::Repository;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use owo_colors::{OwoColorize, Style};
use uuid::Uuid;

use crate::cli::{AddCommand, RecurrenceArgs};
use crate::parser::{parse_date, parse_interval};

/// Interval used for habits added without `--every`.
const DEFAULT_HABIT_INTERVAL: &str = "daily";

pub async fn add_task(
    engine: &HabitEngine<impl Repository>,
    command: AddCommand,
    now: DateTime<Utc>,
) -> Result<()> {
    let timezone = engine.config().timezone;
    let kind = TaskKind::from(command.kind);
    let due = command
        .due
        .as_deref()
        .map(|d| parse_date(d, now, &timezone))
        .transpose()?;

    if kind != TaskKind::Habit && (command.grace.is_some() || command.on.is_some()) {
        return Err(anyhow!(
            "--grace and --on only apply to habits (use --kind habit)"
        ));
    }

    let habit = if kind == TaskKind::Habit {
        let schedule_days = command
            .on
            .as_deref()
            .map(str::parse::<WeekdaySet>)
            .transpose()?
            .unwrap_or_default();
        Some(HabitConfig {
            schedule_days,
            grace_period_days: command
                .grace
                .unwrap_or(engine.config().default_grace_period_days),
        })
    } else {
        None
    };

    let template = OccurrenceTemplate {
        title: command.title,
        description: command.description,
        kind,
        parent_id: command.parent.as_deref().map(Uuid::parse_str).transpose()?,
        tags: command.tag,
        estimated_minutes: command.estimate,
        habit,
    };

    let mut recurrence = command.recurrence;
    if kind == TaskKind::Habit && recurrence.every.is_none() {
        recurrence.every = Some(DEFAULT_HABIT_INTERVAL.to_string());
    }

    let success_style = Style::new().green().bold();
    let info_style = Style::new().blue();

    match recurrence_data(&recurrence, template.clone(), due, now, &timezone)? {
        Some(data) => {
            let (group, first) = engine.create_group(data, now).await?;
            println!(
                "{} Created recurring {}: {}",
                "✓".style(success_style),
                kind,
                group.template.title.bright_white().bold()
            );
            println!("ID: {}", first.id);
            if let Some(due) = first.due_date {
                println!(
                    "  {} First due: {}",
                    "→".style(info_style),
                    due.with_timezone(&timezone)
                        .format("%Y-%m-%d %H:%M %Z")
                        .to_string()
                        .cyan()
                );
            }
            if group.pattern.is_one_time() {
                println!("  {} One-time: no further occurrences", "→".style(info_style));
            }
        }
        None => {
            let task = engine
                .create_task(NewOccurrenceData { template, due_date: due }, now)
                .await?;
            println!(
                "{} Created {}: {}",
                "✓".style(success_style),
                kind,
                task.title().bright_white().bold()
            );
            println!("ID: {}", task.id);
            if let Some(due) = task.due_date {
                println!(
                    "  {} Due: {}",
                    "→".style(info_style),
                    due.with_timezone(&timezone)
                        .format("%Y-%m-%d %H:%M %Z")
                        .to_string()
                        .cyan()
                );
            }
        }
    }

    Ok(())
}

/// Builds recurrence input from command-line options; `None` when `--every` is absent.
///
/// Fixed schedules are anchored at `--anchor`, else at the due date, else at `now`.
/// After-completion groups start at the due date, defaulting to `now`.
pub fn recurrence_data(
    args: &RecurrenceArgs,
    template: OccurrenceTemplate,
    due: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    timezone: &Tz,
) -> Result<Option<NewRecurrenceData>> {
    let Some(every) = args.every.as_deref() else {
        return Ok(None);
    };

    let (interval_value, interval_unit) = parse_interval(every)?;
    let kind = args
        .mode
        .map(RecurrenceKind::from)
        .unwrap_or(RecurrenceKind::FixedSchedule);

    let anchor = args
        .anchor
        .as_deref()
        .map(|a| parse_date(a, now, timezone))
        .transpose()?;
    let anchor_date = match kind {
        RecurrenceKind::FixedSchedule => Some(anchor.or(due).unwrap_or(now)),
        RecurrenceKind::AfterCompletion => anchor,
    };

    Ok(Some(NewRecurrenceData {
        template,
        kind,
        interval_unit,
        interval_value,
        anchor_date,
        excluded_weekdays: args
            .skip
            .as_deref()
            .map(str::parse::<WeekdaySet>)
            .transpose()?
            .unwrap_or_default(),
        day_of_month: args
            .day_of_month
            .as_deref()
            .map(str::parse::<DayOfMonth>)
            .transpose()?,
        end_date: args
            .until
            .as_deref()
            .map(|u| parse_date(u, now, timezone))
            .transpose()?,
        max_occurrence_count: args.count,
        first_due: due,
    }))
}
