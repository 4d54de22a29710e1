use crate::error::CoreError;
use crate::models::{OccurrenceStatus, TaskOccurrence};
use crate::repository::{OccurrenceFilter, OccurrenceRow, SqliteRepository, OCCURRENCE_COLUMNS};
use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

#[async_trait]
impl super::OccurrenceRepository for SqliteRepository {
    async fn add_occurrence(&self, occurrence: &TaskOccurrence) -> Result<(), CoreError> {
        let mut conn = self.pool().acquire().await?;
        insert_occurrence(&mut conn, occurrence).await
    }

    async fn load_occurrence(&self, id: Uuid) -> Result<Option<TaskOccurrence>, CoreError> {
        let mut conn = self.pool().acquire().await?;
        load_occurrence_with(&mut conn, id).await
    }

    async fn find_occurrences_by_short_id_prefix(
        &self,
        short_id: &str,
    ) -> Result<Vec<TaskOccurrence>, CoreError> {
        // The prefix goes into LIKE, so wildcards must never get through
        if let Some(bad) = short_id.chars().find(|c| !(c.is_ascii_hexdigit() || *c == '-')) {
            return Err(CoreError::InvalidInput(format!(
                "'{}' is not a valid ID prefix: unexpected character '{}'",
                short_id, bad
            )));
        }

        // Ids are stored as 16-byte blobs, so match on their hex form without hyphens
        let mut pattern = String::with_capacity(short_id.len() + 1);
        pattern.extend(
            short_id
                .chars()
                .filter(|c| *c != '-')
                .map(|c| c.to_ascii_uppercase()),
        );
        pattern.push('%');

        let rows: Vec<OccurrenceRow> = sqlx::query_as(&format!(
            "SELECT {} FROM occurrences WHERE hex(id) LIKE $1 ORDER BY created_at",
            OCCURRENCE_COLUMNS
        ))
        .bind(pattern)
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(TaskOccurrence::try_from).collect()
    }

    async fn find_occurrences(
        &self,
        filter: &OccurrenceFilter,
    ) -> Result<Vec<TaskOccurrence>, CoreError> {
        let mut query_builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM occurrences WHERE 1 = 1",
            OCCURRENCE_COLUMNS
        ));

        if !filter.include_closed {
            query_builder.push(" AND status NOT IN ('completed', 'archived')");
        }
        if let Some(kind) = filter.kind {
            query_builder.push(" AND kind = ");
            query_builder.push_bind(kind);
        }
        if let Some(group_id) = filter.group_id {
            query_builder.push(" AND group_id = ");
            query_builder.push_bind(group_id);
        }
        query_builder.push(" ORDER BY due_date IS NULL, due_date, created_at");

        let rows: Vec<OccurrenceRow> = query_builder
            .build_query_as()
            .fetch_all(self.pool())
            .await?;

        rows.into_iter().map(TaskOccurrence::try_from).collect()
    }

    async fn update_occurrence_state(
        &self,
        occurrence: &TaskOccurrence,
        expected: OccurrenceStatus,
    ) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;

        let result = sqlx::query(
            r#"UPDATE occurrences
            SET status = $1, updated_at = $2, last_nudge_at = $3, nudge_count = $4
            WHERE id = $5 AND status = $6
            "#,
        )
        .bind(occurrence.status)
        .bind(occurrence.updated_at)
        .bind(occurrence.last_nudge_at)
        .bind(i64::from(occurrence.nudge_count))
        .bind(occurrence.id)
        .bind(expected)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return match current_status(&mut tx, occurrence.id).await? {
                None => Err(CoreError::NotFound(occurrence.id.to_string())),
                Some(current) => Err(CoreError::InvalidTransition {
                    from: current,
                    to: occurrence.status,
                }),
            };
        }

        tx.commit().await?;
        Ok(())
    }
}

pub(crate) async fn insert_occurrence(
    conn: &mut SqliteConnection,
    occurrence: &TaskOccurrence,
) -> Result<(), CoreError> {
    let snapshot = serde_json::to_string(&occurrence.snapshot)?;

    sqlx::query(
        r#"INSERT INTO occurrences (
            id, group_id, status, kind, title, due_date, completed_at, completed_count,
            snapshot, created_at, updated_at, last_nudge_at, nudge_count
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(occurrence.id)
    .bind(occurrence.group_id)
    .bind(occurrence.status)
    .bind(occurrence.kind())
    .bind(occurrence.title())
    .bind(occurrence.due_date)
    .bind(occurrence.completed_at)
    .bind(i64::from(occurrence.completed_count))
    .bind(snapshot)
    .bind(occurrence.created_at)
    .bind(occurrence.updated_at)
    .bind(occurrence.last_nudge_at)
    .bind(i64::from(occurrence.nudge_count))
    .execute(conn)
    .await?;

    Ok(())
}

pub(crate) async fn load_occurrence_with(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<TaskOccurrence>, CoreError> {
    let row: Option<OccurrenceRow> = sqlx::query_as(&format!(
        "SELECT {} FROM occurrences WHERE id = $1",
        OCCURRENCE_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    row.map(TaskOccurrence::try_from).transpose()
}

pub(crate) async fn current_status(
    conn: &mut SqliteConnection,
    id: Uuid,
) -> Result<Option<OccurrenceStatus>, CoreError> {
    let status: Option<(OccurrenceStatus,)> =
        sqlx::query_as("SELECT status FROM occurrences WHERE id = $1")
            .bind(id)
            .fetch_optional(conn)
            .await?;
    Ok(status.map(|(status,)| status))
}
