use crate::domain::outbox::{OutboxDraft, OutboxItem};
use crate::shared::error::AppError;
use async_trait::async_trait;

/// Durable queue of pending local mutations. Every transition is a single
/// guarded write; an item can never look eligible for two upload attempts
/// at once.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Inserts a pending item, or replaces the payload of the existing
    /// pending (or failed) item for the same entity. Idempotent for
    /// repeated identical payloads.
    async fn enqueue(&self, draft: OutboxDraft) -> Result<OutboxItem, AppError>;

    /// Pending items for one entity type, oldest first.
    async fn list_pending(&self, entity_type: &str) -> Result<Vec<OutboxItem>, AppError>;

    /// Failed items for one entity type, with their last error, oldest first.
    async fn list_failed(&self, entity_type: &str) -> Result<Vec<OutboxItem>, AppError>;

    async fn get(&self, id: i64) -> Result<Option<OutboxItem>, AppError>;

    /// `pending -> syncing`.
    async fn mark_syncing(&self, id: i64) -> Result<(), AppError>;

    /// `syncing -> synced`. Terminal.
    async fn mark_synced(&self, id: i64) -> Result<(), AppError>;

    /// `syncing -> failed`, recording the reported reason.
    async fn mark_failed(&self, id: i64, error: &str) -> Result<(), AppError>;

    /// Requeues failed items to `pending`, skipping entities that already
    /// have a pending item. Returns the number of requeued items.
    async fn requeue_failed(&self, entity_type: &str) -> Result<u32, AppError>;
}
