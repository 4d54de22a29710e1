//! # Cadence Core Library
//!
//! Recurrence and habit streak engine: decides when the next occurrence of a recurring
//! task is due, records completions in an append-only ledger, and derives habit streaks
//! from that history.
//!
//! ## Features
//!
//! - **Two recurrence kinds**: fixed calendar schedules with excluded weekdays, and
//!   intervals measured from the actual completion moment
//! - **Deterministic resolution**: every function takes `now` explicitly, so retried
//!   completions recompute identical dates
//! - **Atomic completion**: a completion produces one write-set committed in a single
//!   transaction, with duplicate completions rejected
//! - **Streaks with grace periods**: computed on demand in a configurable timezone
//! - **Someday review**: periodic nudges for open-ended tasks
//!
//! ## Core Modules
//!
//! - [`calendar`]: Interval arithmetic with month-end clamping
//! - [`models`]: Core data structures and transfer objects
//! - [`recurrence`]: Next-due-date resolution and previews
//! - [`generator`]: Completion events turned into write-sets
//! - [`ledger`]: Append-only completion history contract
//! - [`streak`]: Streak derivation from completion history
//! - [`nudge`]: Review scheduling for someday tasks
//! - [`repository`]: Data access layer with Repository pattern
//! - [`db`]: Database connection and migration management
//! - [`engine`]: Service facade used by front ends
//! - [`error`]: Error types
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use cadence_core::{
//!     db,
//!     engine::HabitEngine,
//!     models::{CompletionRequest, EngineConfig, IntervalUnit, NewRecurrenceData,
//!              OccurrenceTemplate, RecurrenceKind, WeekdaySet},
//!     repository::SqliteRepository,
//! };
//! use chrono::Utc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let pool = db::establish_connection("cadence.db").await?;
//!     let engine = HabitEngine::new(SqliteRepository::new(pool), EngineConfig::default());
//!
//!     let now = Utc::now();
//!     let (group, first) = engine
//!         .create_group(
//!             NewRecurrenceData {
//!                 template: OccurrenceTemplate::new("Weekly review"),
//!                 kind: RecurrenceKind::FixedSchedule,
//!                 interval_unit: IntervalUnit::Weeks,
//!                 interval_value: 1,
//!                 anchor_date: Some(now),
//!                 excluded_weekdays: WeekdaySet::WEEKEND,
//!                 day_of_month: None,
//!                 end_date: None,
//!                 max_occurrence_count: None,
//!                 first_due: None,
//!             },
//!             now,
//!         )
//!         .await?;
//!
//!     let write_set = engine
//!         .complete_occurrence(first.id, CompletionRequest::at(Utc::now()), Utc::now())
//!         .await?;
//!     println!("{} next due {:?}", group.template.title, write_set.new_occurrence);
//!
//!     Ok(())
//! }
//! ```

pub mod calendar;
pub mod db;
pub mod engine;
pub mod error;
pub mod generator;
pub mod ledger;
pub mod models;
pub mod nudge;
pub mod recurrence;
pub mod repository;
pub mod streak;
