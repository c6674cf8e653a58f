use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SyncDirection {
    Download,
    Upload,
}

impl std::fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncDirection::Download => f.write_str("download"),
            SyncDirection::Upload => f.write_str("upload"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SyncLogStatus {
    Running,
    Completed,
    Failed,
}

/// One synchronization attempt. Finalized exactly once; an entry left in
/// `running` marks an attempt that was interrupted mid-run.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SyncLogEntry {
    pub id: i64,
    pub entity_type: String,
    pub direction: SyncDirection,
    pub items_count: i64,
    pub success_count: i64,
    pub failed_count: i64,
    pub status: SyncLogStatus,
    pub error: Option<String>,
    pub started_at: i64,
    pub completed_at: Option<i64>,
}

/// Running totals reported while chunks complete, so that a crash mid-run
/// still leaves a useful partial record.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncLogCounts {
    pub items_count: u32,
    pub success_count: u32,
    pub failed_count: u32,
}
