use crate::application::ports::sync_log_store::SyncLogStore;
use crate::domain::sync_log::{SyncDirection, SyncLogCounts, SyncLogEntry};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

pub struct SqliteSyncLogStore {
    pool: Pool<Sqlite>,
}

impl SqliteSyncLogStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SyncLogStore for SqliteSyncLogStore {
    async fn create(&self, entity_type: &str, direction: SyncDirection) -> Result<i64, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO sync_log (entity_type, direction, status, started_at)
            VALUES (?1, ?2, 'running', ?3)
            "#,
        )
        .bind(entity_type)
        .bind(direction)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn update_counts(&self, id: i64, counts: SyncLogCounts) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE sync_log
            SET items_count = ?1, success_count = ?2, failed_count = ?3
            WHERE id = ?4 AND status = 'running'
            "#,
        )
        .bind(counts.items_count)
        .bind(counts.success_count)
        .bind(counts.failed_count)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete(
        &self,
        id: i64,
        success_count: u32,
        failed_count: u32,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE sync_log
            SET status = 'completed', success_count = ?1, failed_count = ?2, completed_at = ?3
            WHERE id = ?4 AND status = 'running'
            "#,
        )
        .bind(success_count)
        .bind(failed_count)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                target: "sync::log",
                id,
                "ignoring complete() on a sync log entry that is not running"
            );
        }
        Ok(())
    }

    async fn fail(&self, id: i64, error: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE sync_log
            SET status = 'failed', error = ?1, completed_at = ?2
            WHERE id = ?3 AND status = 'running'
            "#,
        )
        .bind(error)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(
                target: "sync::log",
                id,
                "ignoring fail() on a sync log entry that is not running"
            );
        }
        Ok(())
    }

    async fn get(&self, id: i64) -> Result<Option<SyncLogEntry>, AppError> {
        let entry = sqlx::query_as::<_, SyncLogEntry>("SELECT * FROM sync_log WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<SyncLogEntry>, AppError> {
        let entries = sqlx::query_as::<_, SyncLogEntry>(
            "SELECT * FROM sync_log ORDER BY started_at DESC, id DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sync_log::SyncLogStatus;
    use crate::infrastructure::database::ConnectionPool;

    async fn setup() -> SqliteSyncLogStore {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();
        SqliteSyncLogStore::new(pool.get_pool().clone())
    }

    #[tokio::test]
    async fn create_then_complete_finalizes_once() {
        let store = setup().await;

        let id = store.create("student", SyncDirection::Download).await.unwrap();
        let entry = store.get(id).await.unwrap().unwrap();
        assert_eq!(entry.status, SyncLogStatus::Running);
        assert!(entry.completed_at.is_none());

        store.complete(id, 10, 2).await.unwrap();
        let entry = store.get(id).await.unwrap().unwrap();
        assert_eq!(entry.status, SyncLogStatus::Completed);
        assert_eq!(entry.success_count, 10);
        assert_eq!(entry.failed_count, 2);
        assert!(entry.completed_at.is_some());

        // A second terminal call never un-finalizes the entry.
        store.fail(id, "too late").await.unwrap();
        let entry = store.get(id).await.unwrap().unwrap();
        assert_eq!(entry.status, SyncLogStatus::Completed);
        assert!(entry.error.is_none());
    }

    #[tokio::test]
    async fn incremental_counts_survive_an_interrupted_run() {
        let store = setup().await;

        let id = store
            .create("student_running_grade", SyncDirection::Upload)
            .await
            .unwrap();
        store
            .update_counts(
                id,
                SyncLogCounts {
                    items_count: 120,
                    success_count: 50,
                    failed_count: 0,
                },
            )
            .await
            .unwrap();

        // No terminal call: the entry stays `running`, marking the attempt
        // as interrupted, with the counts of the completed chunks.
        let entry = store.get(id).await.unwrap().unwrap();
        assert_eq!(entry.status, SyncLogStatus::Running);
        assert_eq!(entry.items_count, 120);
        assert_eq!(entry.success_count, 50);
    }

    #[tokio::test]
    async fn update_counts_does_not_touch_finalized_entries() {
        let store = setup().await;

        let id = store.create("subject", SyncDirection::Download).await.unwrap();
        store.complete(id, 5, 0).await.unwrap();
        store
            .update_counts(
                id,
                SyncLogCounts {
                    items_count: 99,
                    success_count: 99,
                    failed_count: 99,
                },
            )
            .await
            .unwrap();

        let entry = store.get(id).await.unwrap().unwrap();
        assert_eq!(entry.success_count, 5);
        assert_eq!(entry.items_count, 0);
    }

    #[tokio::test]
    async fn list_recent_returns_newest_first() {
        let store = setup().await;

        let first = store.create("institution", SyncDirection::Download).await.unwrap();
        let second = store.create("student", SyncDirection::Download).await.unwrap();

        let entries = store.list_recent(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, second);
        assert_eq!(entries[1].id, first);
    }
}
