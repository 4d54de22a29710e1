use cadence_core::ledger::LedgerSummary;
use cadence_core::models::{OccurrenceStatus, StreakState, TaskKind, TaskOccurrence};
use chrono::{DateTime, Utc};
use chrono_humanize::Humanize;
use chrono_tz::Tz;
use comfy_table::{Attribute, Cell, Color, Row, Table};

use crate::util::short_id;

pub fn display_occurrences(occurrences: &[TaskOccurrence], now: DateTime<Utc>, timezone: &Tz) {
    if occurrences.is_empty() {
        println!("No tasks found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Kind", "Status", "Due Date", "Tags"]);

    let today = now.with_timezone(timezone).date_naive();

    for occurrence in occurrences {
        let mut row = Row::new();
        row.add_cell(Cell::new(short_id(&occurrence.id)));

        let mut display_title = String::new();
        if occurrence.is_recurring() {
            display_title.push('↻'); // Recurring symbol
            display_title.push(' ');
        }
        display_title.push_str(occurrence.title());

        let mut title_cell = Cell::new(display_title);
        title_cell = match occurrence.status {
            OccurrenceStatus::Completed | OccurrenceStatus::Archived => title_cell
                .add_attribute(Attribute::CrossedOut)
                .fg(Color::DarkGrey),
            OccurrenceStatus::Blocked => title_cell.fg(Color::Magenta),
            _ => match occurrence.kind() {
                TaskKind::Habit => title_cell.fg(Color::Cyan),
                TaskKind::Someday => title_cell.fg(Color::Blue),
                TaskKind::Task => title_cell,
            },
        };
        row.add_cell(title_cell);

        row.add_cell(Cell::new(occurrence.kind().to_string()));

        let status_cell = Cell::new(occurrence.status.to_string().replace('_', " "));
        row.add_cell(match occurrence.status {
            OccurrenceStatus::Completed => status_cell.fg(Color::Green),
            OccurrenceStatus::Archived => status_cell.fg(Color::DarkGrey),
            OccurrenceStatus::InProgress => status_cell.fg(Color::Yellow),
            OccurrenceStatus::Blocked => status_cell.fg(Color::Magenta),
            OccurrenceStatus::Ready => status_cell,
        });

        let due_date_cell = if let Some(due_date) = occurrence.due_date {
            let due_text = due_date.humanize();
            let due_day = due_date.with_timezone(timezone).date_naive();

            if occurrence.status.is_terminal() {
                Cell::new(due_text)
            } else if due_date < now {
                Cell::new(due_text).fg(Color::Red) // Overdue
            } else if due_day == today {
                Cell::new(due_text).fg(Color::Yellow) // Due today
            } else {
                Cell::new(due_text)
            }
        } else {
            Cell::new("None")
        };
        row.add_cell(due_date_cell);

        let tags = &occurrence.snapshot.tags;
        row.add_cell(Cell::new(if tags.is_empty() {
            "None".to_string()
        } else {
            tags.join(", ")
        }));
        table.add_row(row);
    }

    println!("{table}");
}

pub fn display_streak(title: &str, streak: &StreakState, summary: &LedgerSummary) {
    let mut table = Table::new();
    table.set_header(vec![Cell::new(title).add_attribute(Attribute::Bold), Cell::new("")]);

    let current = Cell::new(streak.current_streak.to_string());
    table.add_row(vec![
        Cell::new("Current streak"),
        if streak.current_streak > 0 {
            current.fg(Color::Green).add_attribute(Attribute::Bold)
        } else {
            current
        },
    ]);
    table.add_row(vec![
        Cell::new("Longest streak"),
        Cell::new(streak.longest_streak.to_string()),
    ]);
    table.add_row(vec![
        Cell::new("Completed today"),
        if streak.is_completed_today {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no").fg(Color::Yellow)
        },
    ]);
    table.add_row(vec![
        Cell::new("Last completion"),
        Cell::new(match streak.days_since_last_completion {
            None => "never".to_string(),
            Some(0) => "today".to_string(),
            Some(1) => "yesterday".to_string(),
            Some(days) => format!("{} days ago", days),
        }),
    ]);
    table.add_row(vec![
        Cell::new("Completions"),
        Cell::new(format!(
            "{} ({} late, {} retroactive)",
            summary.total, summary.late, summary.retroactive
        )),
    ]);

    println!("{table}");
}

pub fn display_due_dates(dates: &[DateTime<Utc>], timezone: &Tz) {
    if dates.is_empty() {
        println!("No upcoming occurrences.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Due Date", "Weekday", "In"]);

    for (index, date) in dates.iter().enumerate() {
        let local = date.with_timezone(timezone);
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(local.format("%Y-%m-%d %H:%M %Z").to_string()),
            Cell::new(local.format("%A").to_string()),
            Cell::new(date.humanize()),
        ]);
    }

    println!("{table}");
}

/// Someday tasks up for review, with the archive suggestion flagged.
pub fn display_review(tasks: &[(TaskOccurrence, bool)], timezone: &Tz) {
    if tasks.is_empty() {
        println!("Nothing to review.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Title", "Created", "Nudges", "Suggestion"]);

    for (task, suggest_archive) in tasks {
        table.add_row(vec![
            Cell::new(short_id(&task.id)),
            Cell::new(task.title()),
            Cell::new(task.created_at.with_timezone(timezone).format("%Y-%m-%d").to_string()),
            Cell::new(task.nudge_count),
            if *suggest_archive {
                Cell::new("consider archiving").fg(Color::Yellow)
            } else {
                Cell::new("keep")
            },
        ]);
    }

    println!("{table}");
}
