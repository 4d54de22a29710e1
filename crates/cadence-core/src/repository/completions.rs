use crate::error::CoreError;
use crate::generator::WriteSet;
use crate::ledger::{sort_newest_first, CompletionLedger};
use crate::models::{CompletionRecord, OccurrenceStatus};
use crate::repository::groups::update_pattern_pointers;
use crate::repository::occurrences::{current_status, insert_occurrence};
use crate::repository::SqliteRepository;
use async_trait::async_trait;
use sqlx::SqliteConnection;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
impl CompletionLedger for SqliteRepository {
    async fn append(&self, record: &CompletionRecord) -> Result<(), CoreError> {
        let mut conn = self.pool().acquire().await?;
        insert_record(&mut conn, record).await
    }

    async fn query(&self, group_id: Uuid) -> Result<Vec<CompletionRecord>, CoreError> {
        let mut records: Vec<CompletionRecord> = sqlx::query_as(
            r#"SELECT id, group_id, occurrence_id, due_date, completed_at, was_late, was_retroactive
            FROM completion_records
            WHERE group_id = $1
            "#,
        )
        .bind(group_id)
        .fetch_all(self.pool())
        .await?;

        // Stored timestamps are text, so order on the decoded values
        sort_newest_first(&mut records);
        Ok(records)
    }
}

#[async_trait]
impl super::WriteSetRepository for SqliteRepository {
    async fn apply(&self, write_set: &WriteSet) -> Result<(), CoreError> {
        let mut tx = self.pool().begin().await?;
        let completed = &write_set.completed;

        // The status guard makes concurrent completions of one occurrence race on this row
        let result = sqlx::query(
            r#"UPDATE occurrences
            SET status = $1, completed_at = $2, completed_count = $3, updated_at = $4
            WHERE id = $5 AND status NOT IN ('completed', 'archived')
            "#,
        )
        .bind(completed.status)
        .bind(completed.completed_at)
        .bind(i64::from(completed.completed_count))
        .bind(completed.updated_at)
        .bind(completed.id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return match current_status(&mut tx, completed.id).await? {
                None => Err(CoreError::NotFound(completed.id.to_string())),
                Some(OccurrenceStatus::Completed) => Err(CoreError::AlreadyCompleted(completed.id)),
                Some(from) => Err(CoreError::InvalidTransition {
                    from,
                    to: completed.status,
                }),
            };
        }

        insert_record(&mut tx, &write_set.record).await?;

        if let Some(next) = &write_set.new_occurrence {
            insert_occurrence(&mut tx, next).await?;
        }

        if let Some(pattern) = &write_set.updated_pattern {
            let group_id = write_set.group_id().ok_or_else(|| {
                CoreError::InvalidInput("Pattern update without a recurrence group".to_string())
            })?;
            update_pattern_pointers(&mut tx, group_id, pattern).await?;
        }

        tx.commit().await?;
        debug!(
            occurrence_id = %completed.id,
            spawned_next = write_set.spawned_next(),
            "write-set committed"
        );
        Ok(())
    }
}

async fn insert_record(
    conn: &mut SqliteConnection,
    record: &CompletionRecord,
) -> Result<(), CoreError> {
    sqlx::query(
        r#"INSERT INTO completion_records
            (id, group_id, occurrence_id, due_date, completed_at, was_late, was_retroactive)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(record.id)
    .bind(record.group_id)
    .bind(record.occurrence_id)
    .bind(record.due_date)
    .bind(record.completed_at)
    .bind(record.was_late)
    .bind(record.was_retroactive)
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::on_occurrence_completed;
    use crate::models::{
        CompletionRequest, IntervalUnit, OccurrenceTemplate, RecurrenceGroup, RecurrencePattern,
        TaskOccurrence,
    };
    use crate::repository::test_support::setup_repository;
    use crate::repository::{GroupRepository, OccurrenceRepository, WriteSetRepository};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn utc(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap()
    }

    async fn daily_group(repo: &SqliteRepository) -> (RecurrenceGroup, TaskOccurrence) {
        let pattern = RecurrencePattern {
            next_due_date: Some(utc(1, 8)),
            last_generated_at: Some(utc(1, 8)),
            generated_count: 1,
            ..RecurrencePattern::after_completion(IntervalUnit::Days, 1)
        };
        let group = RecurrenceGroup {
            id: Uuid::now_v7(),
            pattern,
            template: OccurrenceTemplate::new("Stretch"),
            created_at: utc(1, 8),
        };
        let first = group
            .template
            .instantiate(Some(group.id), Some(utc(1, 8)), utc(1, 8));
        repo.insert_group(&group, &first).await.unwrap();
        (group, first)
    }

    #[tokio::test]
    async fn test_apply_commits_every_part() {
        let (repo, _temp_dir) = setup_repository().await;
        let (group, first) = daily_group(&repo).await;

        let write_set = on_occurrence_completed(
            &first,
            Some(&group),
            CompletionRequest::at(utc(1, 10)),
            utc(1, 10),
        )
        .unwrap();
        repo.apply(&write_set).await.unwrap();

        let completed = repo.load_occurrence(first.id).await.unwrap().unwrap();
        assert_eq!(completed.status, OccurrenceStatus::Completed);
        assert_eq!(completed.completed_count, 1);

        let next = write_set.new_occurrence.as_ref().unwrap();
        let stored_next = repo.load_occurrence(next.id).await.unwrap().unwrap();
        assert_eq!(stored_next.due_date, Some(utc(2, 10)));

        let stored_group = repo.load_group(group.id).await.unwrap().unwrap();
        assert_eq!(stored_group.pattern.next_due_date, Some(utc(2, 10)));
        assert_eq!(stored_group.pattern.generated_count, 2);

        let records = repo.query(group.id).await.unwrap();
        assert_eq!(records, vec![write_set.record.clone()]);
    }

    #[tokio::test]
    async fn test_second_apply_of_same_occurrence_is_rejected() {
        let (repo, _temp_dir) = setup_repository().await;
        let (group, first) = daily_group(&repo).await;

        // Two writers computed write-sets from the same snapshot
        let request = CompletionRequest::at(utc(1, 10));
        let winner = on_occurrence_completed(&first, Some(&group), request, utc(1, 10)).unwrap();
        let loser = on_occurrence_completed(&first, Some(&group), request, utc(1, 11)).unwrap();

        repo.apply(&winner).await.unwrap();
        let result = repo.apply(&loser).await;
        assert!(matches!(result, Err(CoreError::AlreadyCompleted(id)) if id == first.id));

        // Nothing from the losing write-set was committed
        assert_eq!(repo.query(group.id).await.unwrap().len(), 1);
        let loser_next = loser.new_occurrence.unwrap();
        assert_eq!(repo.load_occurrence(loser_next.id).await.unwrap(), None);
        let stored_group = repo.load_group(group.id).await.unwrap().unwrap();
        assert_eq!(stored_group.pattern.generated_count, 2);
    }

    #[tokio::test]
    async fn test_apply_is_atomic_when_a_later_write_fails() {
        let (repo, _temp_dir) = setup_repository().await;
        let (group, first) = daily_group(&repo).await;

        let mut write_set = on_occurrence_completed(
            &first,
            Some(&group),
            CompletionRequest::at(utc(1, 10)),
            utc(1, 10),
        )
        .unwrap();
        // Reusing an existing id makes the insert of the next occurrence fail
        if let Some(next) = write_set.new_occurrence.as_mut() {
            next.id = first.id;
        }

        assert!(repo.apply(&write_set).await.is_err());

        let untouched = repo.load_occurrence(first.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, OccurrenceStatus::Ready);
        assert!(repo.query(group.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_is_append_only() {
        let (repo, _temp_dir) = setup_repository().await;
        let (group, first) = daily_group(&repo).await;
        let write_set = on_occurrence_completed(
            &first,
            Some(&group),
            CompletionRequest::at(utc(1, 10)),
            utc(1, 10),
        )
        .unwrap();
        repo.apply(&write_set).await.unwrap();

        let update = sqlx::query("UPDATE completion_records SET was_late = TRUE")
            .execute(repo.pool())
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM completion_records")
            .execute(repo.pool())
            .await;
        assert!(delete.is_err());

        assert_eq!(repo.query(group.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_query_returns_newest_first() {
        let (repo, _temp_dir) = setup_repository().await;
        let (group, first) = daily_group(&repo).await;

        for hours in [30, 2, 50] {
            let mut record =
                CompletionRecord::for_occurrence(&first, CompletionRequest::at(utc(1, 0)));
            record.completed_at = utc(1, 0) + Duration::hours(hours);
            repo.append(&record).await.unwrap();
        }

        let records = repo.query(group.id).await.unwrap();
        let times: Vec<_> = records.iter().map(|r| r.completed_at).collect();
        assert_eq!(
            times,
            vec![
                utc(1, 0) + Duration::hours(50),
                utc(1, 0) + Duration::hours(30),
                utc(1, 0) + Duration::hours(2),
            ]
        );
        assert!(repo.query(Uuid::now_v7()).await.unwrap().is_empty());
    }
}
