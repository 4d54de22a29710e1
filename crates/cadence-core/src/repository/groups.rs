use crate::error::CoreError;
use crate::models::{RecurrenceGroup, RecurrencePattern, TaskOccurrence};
use crate::repository::occurrences::insert_occurrence;
use crate::repository::{GroupRow, SqliteRepository, GROUP_COLUMNS};
use async_trait::async_trait;
use sqlx::SqliteConnection;
use uuid::Uuid;

#[async_trait]
impl super::GroupRepository for SqliteRepository {
    async fn insert_group(
        &self,
        group: &RecurrenceGroup,
        first: &TaskOccurrence,
    ) -> Result<(), CoreError> {
        if first.group_id != Some(group.id) {
            return Err(CoreError::InvalidInput(format!(
                "First occurrence {} does not belong to recurrence group {}",
                first.id, group.id
            )));
        }
        group.pattern.validate()?;

        let mut tx = self.pool().begin().await?;

        let pattern = &group.pattern;
        sqlx::query(
            r#"INSERT INTO recurrence_groups (
                id, kind, interval_unit, interval_value, anchor_date, excluded_weekdays,
                day_of_month, end_date, max_occurrence_count, next_due_date,
                last_generated_at, generated_count, template, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(group.id)
        .bind(pattern.kind)
        .bind(pattern.interval_unit)
        .bind(i64::from(pattern.interval_value))
        .bind(pattern.anchor_date)
        .bind(i64::from(pattern.excluded_weekdays.bits()))
        .bind(pattern.day_of_month.map(|day| i64::from(i8::from(day))))
        .bind(pattern.end_date)
        .bind(pattern.max_occurrence_count.map(i64::from))
        .bind(pattern.next_due_date)
        .bind(pattern.last_generated_at)
        .bind(i64::from(pattern.generated_count))
        .bind(serde_json::to_string(&group.template)?)
        .bind(group.created_at)
        .execute(&mut *tx)
        .await?;

        insert_occurrence(&mut tx, first).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn load_group(&self, id: Uuid) -> Result<Option<RecurrenceGroup>, CoreError> {
        let row: Option<GroupRow> = sqlx::query_as(&format!(
            "SELECT {} FROM recurrence_groups WHERE id = $1",
            GROUP_COLUMNS
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        row.map(RecurrenceGroup::try_from).transpose()
    }

    async fn find_groups(&self) -> Result<Vec<RecurrenceGroup>, CoreError> {
        let rows: Vec<GroupRow> = sqlx::query_as(&format!(
            "SELECT {} FROM recurrence_groups ORDER BY created_at",
            GROUP_COLUMNS
        ))
        .fetch_all(self.pool())
        .await?;

        rows.into_iter().map(RecurrenceGroup::try_from).collect()
    }
}

/// Stores the generator-maintained pointers of a pattern.
pub(crate) async fn update_pattern_pointers(
    conn: &mut SqliteConnection,
    group_id: Uuid,
    pattern: &RecurrencePattern,
) -> Result<(), CoreError> {
    let result = sqlx::query(
        r#"UPDATE recurrence_groups
        SET next_due_date = $1, last_generated_at = $2, generated_count = $3
        WHERE id = $4
        "#,
    )
    .bind(pattern.next_due_date)
    .bind(pattern.last_generated_at)
    .bind(i64::from(pattern.generated_count))
    .bind(group_id)
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::NotFound(format!(
            "Recurrence group {} not found",
            group_id
        )));
    }
    Ok(())
}
