//! Offline-first synchronization engine for the gradebook desktop client.
//!
//! The engine keeps a local SQLite mirror of the remote gradebook usable
//! while offline, queues locally made edits in a durable outbox, drains
//! that outbox against the remote system in bounded chunks, and journals
//! every attempt in an append-only sync log.
//!
//! The HTTP transport, token acquisition and UI are collaborators: callers
//! hand an authenticated [`HttpRemoteGateway`] (or any `RemoteGateway`
//! implementation) to the services in [`application::services`].

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::ports::cache_store::CacheStore;
pub use application::ports::outbox_store::OutboxStore;
pub use application::ports::remote_gateway::{
    ConflictedRecord, RejectedRecord, RemoteGateway, UploadChunkResponse,
};
pub use application::ports::sync_log_store::SyncLogStore;
pub use application::services::local_edit::LocalEditService;
pub use application::services::seed_service::{PipelineOutcome, SeedPipeline, SeedStage, StageReport};
pub use application::services::upload_service::{
    ConflictedUpload, FailedUpload, SyncOutcome, SyncSummary, UploadSyncService,
};
pub use domain::cache::{entity_types, CacheEntry, RemoteRecord};
pub use domain::outbox::{OutboxDraft, OutboxItem, OutboxStatus};
pub use domain::sync_log::{SyncDirection, SyncLogEntry, SyncLogStatus};
pub use infrastructure::api::HttpRemoteGateway;
pub use infrastructure::database::ConnectionPool;
pub use infrastructure::offline::{SqliteCacheStore, SqliteOutboxStore, SqliteSyncLogStore};
pub use shared::config::{ApiConfig, AppConfig, DatabaseConfig, SyncConfig};
pub use shared::error::{AppError, Result};
