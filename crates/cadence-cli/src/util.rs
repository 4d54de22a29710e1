use anyhow::{anyhow, Result};
use cadence_core::error::CoreError;
use cadence_core::models::TaskOccurrence;
use cadence_core::repository::{OccurrenceRepository, Repository};

/// Resolves a full or abbreviated occurrence ID.
pub async fn resolve_occurrence(repo: &impl Repository, short_id: &str) -> Result<TaskOccurrence> {
    if short_id.len() < 2 {
        return Err(anyhow!(CoreError::InvalidInput(
            "Short ID must be at least 2 characters long.".to_string()
        )));
    }
    let mut occurrences = repo.find_occurrences_by_short_id_prefix(short_id).await?;
    match occurrences.len() {
        1 => Ok(occurrences.remove(0)),
        0 => Err(anyhow!(CoreError::NotFound(format!(
            "No occurrence found with ID prefix '{}'",
            short_id
        )))),
        _ => {
            let candidates: Vec<(String, String)> = occurrences
                .into_iter()
                .map(|o| (o.id.to_string(), o.snapshot.title))
                .collect();
            Err(anyhow!(CoreError::AmbiguousId(candidates)))
        }
    }
}

/// Leading part of an ID shown in tables.
///
/// IDs are time-ordered, so the prefix runs past the millisecond timestamp into the
/// random bits to stay unique among tasks created together.
pub fn short_id(id: &uuid::Uuid) -> String {
    id.to_string()[..SHORT_ID_LEN].to_string()
}

const SHORT_ID_LEN: usize = 18;
