use crate::domain::sync_log::{SyncDirection, SyncLogCounts, SyncLogEntry};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Append-only journal of synchronization attempts. `complete` and `fail`
/// are terminal; a later terminal call on the same entry is ignored, never
/// un-finalizing a finished record.
#[async_trait]
pub trait SyncLogStore: Send + Sync {
    async fn create(&self, entity_type: &str, direction: SyncDirection) -> Result<i64, AppError>;

    /// Overwrites the running totals of an in-flight entry.
    async fn update_counts(&self, id: i64, counts: SyncLogCounts) -> Result<(), AppError>;

    async fn complete(&self, id: i64, success_count: u32, failed_count: u32)
        -> Result<(), AppError>;

    async fn fail(&self, id: i64, error: &str) -> Result<(), AppError>;

    async fn get(&self, id: i64) -> Result<Option<SyncLogEntry>, AppError>;

    async fn list_recent(&self, limit: u32) -> Result<Vec<SyncLogEntry>, AppError>;
}
