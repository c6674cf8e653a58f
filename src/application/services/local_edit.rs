use crate::application::ports::cache_store::CacheStore;
use crate::application::ports::outbox_store::OutboxStore;
use crate::domain::outbox::{OutboxDraft, OutboxItem};
use crate::shared::error::AppError;
use std::sync::Arc;

/// Records a user-made mutation while offline: the cache entry is updated
/// so the UI keeps showing the edit, and a matching outbox item is queued
/// for the next upload run.
pub struct LocalEditService {
    cache: Arc<dyn CacheStore>,
    outbox: Arc<dyn OutboxStore>,
}

impl LocalEditService {
    pub fn new(cache: Arc<dyn CacheStore>, outbox: Arc<dyn OutboxStore>) -> Self {
        Self { cache, outbox }
    }

    pub async fn record_edit(
        &self,
        entity_type: &str,
        entity_id: &str,
        payload: serde_json::Value,
    ) -> Result<OutboxItem, AppError> {
        if entity_id.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "entity_id must not be empty".to_string(),
            ));
        }
        if !payload.is_object() {
            return Err(AppError::InvalidInput(
                "edit payload must be a JSON object".to_string(),
            ));
        }

        self.cache.upsert(entity_type, entity_id, &payload).await?;
        let item = self
            .outbox
            .enqueue(OutboxDraft::new(entity_type, entity_id, payload))
            .await?;

        tracing::debug!(
            target: "sync::outbox",
            entity_type,
            entity_id,
            outbox_id = item.id,
            "local edit recorded"
        );

        Ok(item)
    }
}
