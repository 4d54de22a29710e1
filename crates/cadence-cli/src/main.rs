use cadence_core::db;
use cadence_core::engine::HabitEngine;
use cadence_core::error::CoreError;
use cadence_core::repository::SqliteRepository;
use chrono::Utc;
use clap::Parser;
use owo_colors::{OwoColorize, Style};
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;
mod config;
mod parser;
mod util;
mod views;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("CADENCE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = cli::Cli::parse();

    if let Err(e) = run(cli).await {
        handle_error(e);
        std::process::exit(1);
    }
}

async fn run(cli: cli::Cli) -> anyhow::Result<()> {
    let config = config::Config::new()?;
    let engine_config = config.engine_config()?;
    tracing::debug!(
        database = %config.database_path,
        timezone = %engine_config.timezone,
        "starting"
    );

    let db_pool = db::establish_connection(&config.database_path).await?;
    let engine = HabitEngine::new(SqliteRepository::new(db_pool), engine_config);
    let now = Utc::now();

    match cli.command {
        cli::Commands::Add(command) => commands::add::add_task(&engine, command, now).await,
        cli::Commands::List(command) => {
            commands::list::list_occurrences(&engine, command, now).await
        }
        cli::Commands::Done(command) => {
            commands::done::complete_occurrence(&engine, command, now).await
        }
        cli::Commands::Mark(command) => {
            commands::mark::mark_occurrence(&engine, command, now).await
        }
        cli::Commands::Archive(command) => {
            commands::mark::archive_occurrence(&engine, command, now).await
        }
        cli::Commands::Streak(command) => {
            commands::streak::show_streak(&engine, command, now).await
        }
        cli::Commands::Preview(command) => commands::preview::preview(&engine, command, now).await,
        cli::Commands::Review(command) => commands::review::review(&engine, command, now).await,
    }
}

fn handle_error(err: anyhow::Error) {
    let error_style = Style::new().red().bold();

    let Some(core_error) = err.downcast_ref::<CoreError>() else {
        eprintln!("{} {:#}", "Error:".style(error_style), err);
        return;
    };

    match core_error {
        CoreError::NotFound(s) => {
            eprintln!("{} {}", "Error:".style(error_style), s);
        }
        CoreError::AmbiguousId(candidates) => {
            eprintln!("{}", "Error: Ambiguous ID.".style(error_style));
            eprintln!("Did you mean one of these?");
            for (id, title) in candidates {
                eprintln!("  {} ({})", id.yellow(), title);
            }
        }
        CoreError::InvalidInput(s) => {
            eprintln!("{} Invalid input: {}", "Error:".style(error_style), s);
        }
        CoreError::InvalidPattern(s) => {
            eprintln!(
                "{} Invalid recurrence: {}",
                "Error:".style(error_style),
                s.yellow()
            );
        }
        CoreError::AlreadyCompleted(id) => {
            eprintln!(
                "{} Occurrence {} is already completed",
                "Error:".style(error_style),
                id.to_string().yellow()
            );
        }
        CoreError::InvalidTransition { from, to } => {
            eprintln!(
                "{} Cannot move an occurrence from {} to {}",
                "Error:".style(error_style),
                from.yellow(),
                to.yellow()
            );
        }
        CoreError::InvalidTimezone(s) => {
            eprintln!("{} Invalid timezone {}", "Error:".style(error_style), s);
        }
        _ => eprintln!("{} {:#}", "Error:".style(error_style), err),
    }
}
