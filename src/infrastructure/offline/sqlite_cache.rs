use crate::application::ports::cache_store::CacheStore;
use crate::domain::cache::{CacheEntry, RemoteRecord};
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Sqlite};

pub struct SqliteCacheStore {
    pool: Pool<Sqlite>,
}

impl SqliteCacheStore {
    pub fn new(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    async fn upsert_row(
        &self,
        entity_type: &str,
        entity_id: &str,
        payload: &serde_json::Value,
        now: i64,
    ) -> Result<(), AppError> {
        let payload = serde_json::to_string(payload)?;
        sqlx::query(
            r#"
            INSERT INTO cache_entries (entity_type, entity_id, payload, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(entity_type, entity_id) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(&payload)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn upsert(
        &self,
        entity_type: &str,
        entity_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), AppError> {
        self.upsert_row(entity_type, entity_id, payload, Utc::now().timestamp())
            .await
    }

    async fn upsert_many(
        &self,
        entity_type: &str,
        records: &[RemoteRecord],
    ) -> Result<u32, AppError> {
        let now = Utc::now().timestamp();
        let mut written = 0u32;
        for record in records {
            self.upsert_row(entity_type, &record.id, &record.payload, now)
                .await?;
            written += 1;
        }
        Ok(written)
    }

    async fn get(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Option<CacheEntry>, AppError> {
        let entry = sqlx::query_as::<_, CacheEntry>(
            "SELECT * FROM cache_entries WHERE entity_type = ?1 AND entity_id = ?2",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn list(&self, entity_type: &str) -> Result<Vec<CacheEntry>, AppError> {
        let entries = sqlx::query_as::<_, CacheEntry>(
            "SELECT * FROM cache_entries WHERE entity_type = ?1 ORDER BY entity_id ASC",
        )
        .bind(entity_type)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    async fn count(&self, entity_type: &str) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM cache_entries WHERE entity_type = ?1",
        )
        .bind(entity_type)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn clear_all(&self) -> Result<(), AppError> {
        sqlx::query("DELETE FROM cache_entries")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
