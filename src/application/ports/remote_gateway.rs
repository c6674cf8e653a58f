use crate::domain::cache::RemoteRecord;
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A record the server rejected with a validation reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedRecord {
    pub data: serde_json::Value,
    pub error: String,
}

/// A record the server rejected because the remote copy changed since the
/// client last fetched it. Never auto-merged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictedRecord {
    pub data: serde_json::Value,
    pub message: String,
}

/// Server verdict for one uploaded chunk: three disjoint subsets keyed back
/// to the submitted records.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadChunkResponse {
    #[serde(default)]
    pub synced: Vec<String>,
    #[serde(default)]
    pub failed: Vec<RejectedRecord>,
    #[serde(default)]
    pub conflicts: Vec<ConflictedRecord>,
}

/// Remote system of record. Any error from these methods means no
/// structured response was obtained, and callers treat it as a
/// connection-level failure.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn upload_grades(
        &self,
        grades: &[serde_json::Value],
    ) -> Result<UploadChunkResponse, AppError>;

    async fn fetch_institution(&self) -> Result<Vec<RemoteRecord>, AppError>;

    async fn fetch_class_sections(&self) -> Result<Vec<RemoteRecord>, AppError>;

    /// Teaching loads assigned to the authenticated user. Each load embeds
    /// the class section and teacher it refers to.
    async fn fetch_assigned_subjects(&self) -> Result<Vec<RemoteRecord>, AppError>;

    async fn fetch_students(
        &self,
        class_section_ids: &[String],
    ) -> Result<Vec<RemoteRecord>, AppError>;

    async fn fetch_gradable_items(
        &self,
        subject_ids: &[String],
    ) -> Result<Vec<RemoteRecord>, AppError>;

    async fn fetch_running_grades(
        &self,
        class_section_ids: &[String],
    ) -> Result<Vec<RemoteRecord>, AppError>;
}
