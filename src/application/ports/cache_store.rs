use crate::domain::cache::{CacheEntry, RemoteRecord};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Key-indexed store of mirrored remote entities.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn upsert(
        &self,
        entity_type: &str,
        entity_id: &str,
        payload: &serde_json::Value,
    ) -> Result<(), AppError>;

    /// Upserts a batch of fetched records. Returns the number written.
    async fn upsert_many(
        &self,
        entity_type: &str,
        records: &[RemoteRecord],
    ) -> Result<u32, AppError>;

    async fn get(&self, entity_type: &str, entity_id: &str)
        -> Result<Option<CacheEntry>, AppError>;

    async fn list(&self, entity_type: &str) -> Result<Vec<CacheEntry>, AppError>;

    async fn count(&self, entity_type: &str) -> Result<i64, AppError>;

    /// Drops every cached entity. Used on logout; the outbox and sync log
    /// are not touched.
    async fn clear_all(&self) -> Result<(), AppError>;
}
