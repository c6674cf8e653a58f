use crate::application::ports::outbox_store::OutboxStore;
use crate::domain::outbox::{OutboxDraft, OutboxItem, OutboxStatus};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite};
use uuid::Uuid;

pub struct SqliteOutboxStore {
    pool: Pool<Sqlite>,
}

impl SqliteOutboxStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn fetch(&self, id: i64) -> Result<OutboxItem, AppError> {
        let item = sqlx::query_as::<_, OutboxItem>("SELECT * FROM outbox_items WHERE id = ?1")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(item)
    }

    /// Guarded single-statement transition. Fails loudly when the item is
    /// not in `from`, so a torn or double transition can never go unnoticed.
    async fn transition(
        &self,
        id: i64,
        from: OutboxStatus,
        to: OutboxStatus,
        error_message: Option<&str>,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"
            UPDATE outbox_items
            SET status = ?1, error_message = ?2, updated_at = ?3
            WHERE id = ?4 AND status = ?5
            "#,
        )
        .bind(to)
        .bind(error_message)
        .bind(Utc::now().timestamp())
        .bind(id)
        .bind(from)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            let current = sqlx::query_scalar::<_, String>(
                "SELECT status FROM outbox_items WHERE id = ?1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

            return Err(match current {
                Some(status) => AppError::InvalidTransition(format!(
                    "outbox item {id}: {status} -> {to}"
                )),
                None => AppError::InvalidTransition(format!("outbox item {id} does not exist")),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl OutboxStore for SqliteOutboxStore {
    async fn enqueue(&self, draft: OutboxDraft) -> Result<OutboxItem, AppError> {
        let payload = serde_json::to_string(&draft.payload)?;
        let now = Utc::now().timestamp();

        // A fresh edit supersedes the entity's pending item (payload swap in
        // place, keeping queue position) or its failed item (reset to
        // pending for the next run).
        let existing = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM outbox_items
            WHERE entity_type = ?1 AND entity_id = ?2
              AND status IN ('pending', 'failed')
            ORDER BY id DESC
            LIMIT 1
            "#,
        )
        .bind(&draft.entity_type)
        .bind(&draft.entity_id)
        .fetch_optional(&self.pool)
        .await?;

        let id = match existing {
            Some(id) => {
                sqlx::query(
                    r#"
                    UPDATE outbox_items
                    SET payload = ?1, status = 'pending', error_message = NULL, updated_at = ?2
                    WHERE id = ?3
                    "#,
                )
                .bind(&payload)
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await?;
                id
            }
            None => {
                let result = sqlx::query(
                    r#"
                    INSERT INTO outbox_items (
                        local_id, entity_type, entity_id, payload,
                        status, created_at, updated_at
                    ) VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?5)
                    "#,
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&draft.entity_type)
                .bind(&draft.entity_id)
                .bind(&payload)
                .bind(now)
                .execute(&self.pool)
                .await?;
                result.last_insert_rowid()
            }
        };

        self.fetch(id).await
    }

    async fn list_pending(&self, entity_type: &str) -> Result<Vec<OutboxItem>, AppError> {
        let items = sqlx::query_as::<_, OutboxItem>(
            r#"
            SELECT * FROM outbox_items
            WHERE entity_type = ?1 AND status = 'pending'
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(entity_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn list_failed(&self, entity_type: &str) -> Result<Vec<OutboxItem>, AppError> {
        let items = sqlx::query_as::<_, OutboxItem>(
            r#"
            SELECT * FROM outbox_items
            WHERE entity_type = ?1 AND status = 'failed'
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(entity_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    async fn get(&self, id: i64) -> Result<Option<OutboxItem>, AppError> {
        let item = sqlx::query_as::<_, OutboxItem>("SELECT * FROM outbox_items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    async fn mark_syncing(&self, id: i64) -> Result<(), AppError> {
        self.transition(id, OutboxStatus::Pending, OutboxStatus::Syncing, None)
            .await
    }

    async fn mark_synced(&self, id: i64) -> Result<(), AppError> {
        self.transition(id, OutboxStatus::Syncing, OutboxStatus::Synced, None)
            .await
    }

    async fn mark_failed(&self, id: i64, error: &str) -> Result<(), AppError> {
        self.transition(id, OutboxStatus::Syncing, OutboxStatus::Failed, Some(error))
            .await
    }

    async fn requeue_failed(&self, entity_type: &str) -> Result<u32, AppError> {
        // An entity can hold several failed rows (an edit made while the
        // old item was syncing inserts a fresh one; both can then fail).
        // Only the newest failed row per entity goes back to pending, or
        // the partial unique index on pending items would be violated.
        let result = sqlx::query(
            r#"
            UPDATE outbox_items
            SET status = 'pending', error_message = NULL, updated_at = ?1
            WHERE entity_type = ?2 AND status = 'failed'
              AND id = (
                  SELECT MAX(newest.id) FROM outbox_items newest
                  WHERE newest.entity_type = outbox_items.entity_type
                    AND newest.entity_id = outbox_items.entity_id
                    AND newest.status = 'failed'
              )
              AND NOT EXISTS (
                  SELECT 1 FROM outbox_items newer
                  WHERE newer.entity_type = outbox_items.entity_type
                    AND newer.entity_id = outbox_items.entity_id
                    AND newer.status = 'pending'
              )
            "#,
        )
        .bind(Utc::now().timestamp())
        .bind(entity_type)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as u32)
    }
}
