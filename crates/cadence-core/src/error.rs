use thiserror::Error;
use uuid::Uuid;

use crate::models::OccurrenceStatus;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Persistence error")]
    Persistence(#[from] sqlx::Error),

    #[error("Migration error")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid recurrence pattern: {0}")]
    InvalidPattern(String),

    #[error("Occurrence {0} is already completed")]
    AlreadyCompleted(Uuid),

    #[error("Cannot move an occurrence from {from} to {to}")]
    InvalidTransition {
        from: OccurrenceStatus,
        to: OccurrenceStatus,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Ambiguous short ID. Did you mean one of these?")]
    AmbiguousId(Vec<(String, String)>), // Vec of (ID, Title)
}
