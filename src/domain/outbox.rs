use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Status of a queued local mutation.
///
/// ```text
/// pending -> syncing -> synced (terminal)
///                    -> failed -> pending (requeue)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum OutboxStatus {
    Pending,
    Syncing,
    Synced,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Syncing => "syncing",
            OutboxStatus::Synced => "synced",
            OutboxStatus::Failed => "failed",
        }
    }

    /// `synced` items are never picked up by a later upload run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OutboxStatus::Synced)
    }
}

impl std::fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One pending local mutation, durable until the server accepts it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutboxItem {
    pub id: i64,
    pub local_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub payload: String,
    pub status: OutboxStatus,
    pub error_message: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl OutboxItem {
    pub fn payload_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}

/// A mutation about to be enqueued. Identity is `(entity_type, entity_id)`;
/// enqueuing for an entity that already has a pending item replaces that
/// item's payload in place.
#[derive(Debug, Clone)]
pub struct OutboxDraft {
    pub entity_type: String,
    pub entity_id: String,
    pub payload: serde_json::Value,
}

impl OutboxDraft {
    pub fn new(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            payload,
        }
    }
}
