use crate::application::ports::outbox_store::OutboxStore;
use crate::application::ports::remote_gateway::{RemoteGateway, UploadChunkResponse};
use crate::application::ports::sync_log_store::SyncLogStore;
use crate::domain::cache::record_id;
use crate::domain::outbox::OutboxItem;
use crate::domain::sync_log::{SyncDirection, SyncLogCounts};
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

const CONNECTION_INTERRUPTED: &str = "connection interrupted";

#[derive(Debug, Clone, Serialize)]
pub struct FailedUpload {
    pub payload: serde_json::Value,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConflictedUpload {
    pub payload: serde_json::Value,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SyncSummary {
    pub total: usize,
    pub synced_count: usize,
    pub failed_count: usize,
    pub conflict_count: usize,
}

/// Aggregated result of one upload run. `success` stays true on partial
/// failure; it only drops when the run lost connectivity and synced nothing.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncOutcome {
    pub success: bool,
    pub synced: Vec<String>,
    pub failed: Vec<FailedUpload>,
    pub conflicts: Vec<ConflictedUpload>,
    pub connection_lost: bool,
    pub summary: SyncSummary,
}

/// Drains the outbox against the remote system in bounded, ordered chunks.
///
/// Chunks are submitted strictly one at a time. A transport-level failure
/// aborts the remainder of the run: the in-flight chunk is marked failed,
/// chunks already committed stand, and chunks not yet attempted stay
/// pending for the next run.
pub struct UploadSyncService {
    outbox: Arc<dyn OutboxStore>,
    gateway: Arc<dyn RemoteGateway>,
    sync_log: Arc<dyn SyncLogStore>,
    config: SyncConfig,
    run_gate: Mutex<()>,
}

impl UploadSyncService {
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        gateway: Arc<dyn RemoteGateway>,
        sync_log: Arc<dyn SyncLogStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            outbox,
            gateway,
            sync_log,
            config,
            run_gate: Mutex::new(()),
        }
    }

    /// Uploads every pending outbox item of `entity_type`. Returns
    /// `AppError::SyncInProgress` when another run is already in flight.
    pub async fn upload_pending(&self, entity_type: &str) -> Result<SyncOutcome, AppError> {
        let _guard = self
            .run_gate
            .try_lock()
            .map_err(|_| AppError::SyncInProgress)?;

        let log_id = self
            .sync_log
            .create(entity_type, SyncDirection::Upload)
            .await?;

        if self.config.requeue_failed {
            let requeued = self.outbox.requeue_failed(entity_type).await?;
            if requeued > 0 {
                tracing::info!(
                    target: "sync::upload",
                    entity_type,
                    requeued,
                    "requeued failed outbox items"
                );
            }
        }

        let items = self.outbox.list_pending(entity_type).await?;
        if items.is_empty() {
            self.sync_log.complete(log_id, 0, 0).await?;
            return Ok(SyncOutcome {
                success: true,
                ..SyncOutcome::default()
            });
        }

        let total = items.len();
        let mut outcome = SyncOutcome {
            success: true,
            ..SyncOutcome::default()
        };

        tracing::info!(
            target: "sync::upload",
            entity_type,
            total,
            chunk_size = self.config.chunk_size,
            "starting upload run"
        );

        for chunk in items.chunks(self.config.chunk_size) {
            let mut payloads = Vec::with_capacity(chunk.len());
            for item in chunk {
                payloads.push(item.payload_json()?);
            }
            for item in chunk {
                self.outbox.mark_syncing(item.id).await?;
            }

            match self.gateway.upload_grades(&payloads).await {
                Ok(response) => {
                    self.apply_chunk_response(chunk, &payloads, response, &mut outcome)
                        .await?;
                }
                Err(err) => {
                    tracing::warn!(
                        target: "sync::upload",
                        entity_type,
                        error = %err,
                        "chunk upload failed at transport level, aborting run"
                    );
                    for (item, payload) in chunk.iter().zip(payloads) {
                        self.outbox
                            .mark_failed(item.id, CONNECTION_INTERRUPTED)
                            .await?;
                        outcome.failed.push(FailedUpload {
                            payload,
                            error: CONNECTION_INTERRUPTED.to_string(),
                        });
                    }
                    outcome.connection_lost = true;
                }
            }

            self.sync_log
                .update_counts(
                    log_id,
                    SyncLogCounts {
                        items_count: total as u32,
                        success_count: outcome.synced.len() as u32,
                        failed_count: (outcome.failed.len() + outcome.conflicts.len()) as u32,
                    },
                )
                .await?;

            if outcome.connection_lost {
                break;
            }
        }

        outcome.success = !(outcome.connection_lost && outcome.synced.is_empty());
        outcome.summary = SyncSummary {
            total,
            synced_count: outcome.synced.len(),
            failed_count: outcome.failed.len(),
            conflict_count: outcome.conflicts.len(),
        };

        let failed_total = (outcome.failed.len() + outcome.conflicts.len()) as u32;
        if outcome.success {
            self.sync_log
                .complete(log_id, outcome.synced.len() as u32, failed_total)
                .await?;
        } else {
            self.sync_log
                .fail(log_id, "connection interrupted before any item synced")
                .await?;
        }

        tracing::info!(
            target: "sync::upload",
            entity_type,
            synced = outcome.summary.synced_count,
            failed = outcome.summary.failed_count,
            conflicts = outcome.summary.conflict_count,
            connection_lost = outcome.connection_lost,
            "upload run finished"
        );

        Ok(outcome)
    }

    /// Applies the server's verdict to the chunk, walking items in their
    /// original order so the outcome preserves FIFO.
    async fn apply_chunk_response(
        &self,
        chunk: &[OutboxItem],
        payloads: &[serde_json::Value],
        response: UploadChunkResponse,
        outcome: &mut SyncOutcome,
    ) -> Result<(), AppError> {
        let synced_ids: HashSet<&str> = response.synced.iter().map(String::as_str).collect();
        let mut failed_by_id: HashMap<String, String> = response
            .failed
            .into_iter()
            .filter_map(|r| record_id(&r.data).map(|id| (id, r.error)))
            .collect();
        let mut conflicts_by_id: HashMap<String, String> = response
            .conflicts
            .into_iter()
            .filter_map(|r| record_id(&r.data).map(|id| (id, r.message)))
            .collect();

        for (item, payload) in chunk.iter().zip(payloads) {
            if synced_ids.contains(item.entity_id.as_str()) {
                self.outbox.mark_synced(item.id).await?;
                outcome.synced.push(item.entity_id.clone());
            } else if let Some(message) = conflicts_by_id.remove(&item.entity_id) {
                self.outbox.mark_failed(item.id, &message).await?;
                outcome.conflicts.push(ConflictedUpload {
                    payload: payload.clone(),
                    message,
                });
            } else if let Some(error) = failed_by_id.remove(&item.entity_id) {
                self.outbox.mark_failed(item.id, &error).await?;
                outcome.failed.push(FailedUpload {
                    payload: payload.clone(),
                    error,
                });
            } else {
                // The server response must cover the whole chunk; an item it
                // never mentions cannot be assumed accepted.
                let error = "not acknowledged by server".to_string();
                self.outbox.mark_failed(item.id, &error).await?;
                outcome.failed.push(FailedUpload {
                    payload: payload.clone(),
                    error,
                });
            }
        }

        if !failed_by_id.is_empty() || !conflicts_by_id.is_empty() {
            tracing::warn!(
                target: "sync::upload",
                unmatched_failed = failed_by_id.len(),
                unmatched_conflicts = conflicts_by_id.len(),
                "server reported records that are not part of the submitted chunk"
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::remote_gateway::{ConflictedRecord, RejectedRecord};
    use crate::domain::outbox::{OutboxDraft, OutboxStatus};
    use crate::domain::sync_log::SyncLogStatus;
    use crate::infrastructure::database::ConnectionPool;
    use crate::infrastructure::offline::{SqliteOutboxStore, SqliteSyncLogStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted gateway: one queued result per expected chunk request.
    struct ScriptedGateway {
        responses: std::sync::Mutex<Vec<Result<UploadChunkResponse, AppError>>>,
        requests: std::sync::Mutex<Vec<Vec<serde_json::Value>>>,
        calls: AtomicUsize,
    }

    impl ScriptedGateway {
        fn new(responses: Vec<Result<UploadChunkResponse, AppError>>) -> Self {
            Self {
                responses: std::sync::Mutex::new(responses),
                requests: std::sync::Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn accept_all(grades: &[serde_json::Value]) -> UploadChunkResponse {
            UploadChunkResponse {
                synced: grades
                    .iter()
                    .filter_map(|g| record_id(g))
                    .collect(),
                failed: Vec::new(),
                conflicts: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl RemoteGateway for ScriptedGateway {
        async fn upload_grades(
            &self,
            grades: &[serde_json::Value],
        ) -> Result<UploadChunkResponse, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(grades.to_vec());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Ok(Self::accept_all(grades));
            }
            responses.remove(0)
        }

        async fn fetch_institution(&self) -> Result<Vec<crate::domain::cache::RemoteRecord>, AppError> {
            unimplemented!("not used in upload tests")
        }
        async fn fetch_class_sections(&self) -> Result<Vec<crate::domain::cache::RemoteRecord>, AppError> {
            unimplemented!("not used in upload tests")
        }
        async fn fetch_assigned_subjects(&self) -> Result<Vec<crate::domain::cache::RemoteRecord>, AppError> {
            unimplemented!("not used in upload tests")
        }
        async fn fetch_students(
            &self,
            _class_section_ids: &[String],
        ) -> Result<Vec<crate::domain::cache::RemoteRecord>, AppError> {
            unimplemented!("not used in upload tests")
        }
        async fn fetch_gradable_items(
            &self,
            _subject_ids: &[String],
        ) -> Result<Vec<crate::domain::cache::RemoteRecord>, AppError> {
            unimplemented!("not used in upload tests")
        }
        async fn fetch_running_grades(
            &self,
            _class_section_ids: &[String],
        ) -> Result<Vec<crate::domain::cache::RemoteRecord>, AppError> {
            unimplemented!("not used in upload tests")
        }
    }

    const GRADES: &str = "student_running_grade";

    async fn setup(
        responses: Vec<Result<UploadChunkResponse, AppError>>,
        config: SyncConfig,
    ) -> (
        UploadSyncService,
        Arc<SqliteOutboxStore>,
        Arc<SqliteSyncLogStore>,
        Arc<ScriptedGateway>,
    ) {
        let pool = ConnectionPool::from_memory().await.unwrap();
        pool.migrate().await.unwrap();

        let outbox = Arc::new(SqliteOutboxStore::new(pool.get_pool().clone()));
        let sync_log = Arc::new(SqliteSyncLogStore::new(pool.get_pool().clone()));
        let gateway = Arc::new(ScriptedGateway::new(responses));

        let service = UploadSyncService::new(
            outbox.clone(),
            gateway.clone(),
            sync_log.clone(),
            config,
        );
        (service, outbox, sync_log, gateway)
    }

    async fn enqueue_grades(outbox: &SqliteOutboxStore, count: usize) {
        for i in 0..count {
            outbox
                .enqueue(OutboxDraft::new(
                    GRADES,
                    format!("grade-{i:03}"),
                    json!({"id": format!("grade-{i:03}"), "score": i}),
                ))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn empty_queue_issues_no_request_and_succeeds() {
        let (service, _outbox, sync_log, gateway) =
            setup(Vec::new(), SyncConfig { chunk_size: 50, requeue_failed: false }).await;

        let outcome = service.upload_pending(GRADES).await.unwrap();

        assert!(outcome.success);
        assert!(!outcome.connection_lost);
        assert_eq!(outcome.summary.total, 0);
        assert_eq!(gateway.call_count(), 0);

        let entry = sync_log.get(1).await.unwrap().unwrap();
        assert_eq!(entry.status, SyncLogStatus::Completed);
        assert_eq!(entry.items_count, 0);
    }

    #[tokio::test]
    async fn chunking_issues_one_request_per_fifty_items() {
        let (service, outbox, _sync_log, gateway) =
            setup(Vec::new(), SyncConfig { chunk_size: 50, requeue_failed: false }).await;
        enqueue_grades(&outbox, 120).await;

        let outcome = service.upload_pending(GRADES).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.summary.synced_count, 120);
        assert_eq!(gateway.call_count(), 3);

        let sizes: Vec<usize> = gateway
            .requests
            .lock()
            .unwrap()
            .iter()
            .map(Vec::len)
            .collect();
        assert_eq!(sizes, vec![50, 50, 20]);
    }

    #[tokio::test]
    async fn synced_ids_come_back_in_creation_order() {
        let (service, outbox, _sync_log, _gateway) =
            setup(Vec::new(), SyncConfig { chunk_size: 50, requeue_failed: false }).await;
        enqueue_grades(&outbox, 3).await;

        let outcome = service.upload_pending(GRADES).await.unwrap();

        assert_eq!(
            outcome.synced,
            vec!["grade-000", "grade-001", "grade-002"]
        );
    }

    #[tokio::test]
    async fn transport_failure_aborts_remaining_chunks() {
        let first = Ok(UploadChunkResponse {
            synced: (0..2).map(|i| format!("grade-{i:03}")).collect(),
            failed: Vec::new(),
            conflicts: Vec::new(),
        });
        let second = Err(AppError::Network("connection reset".to_string()));
        let (service, outbox, sync_log, gateway) = setup(
            vec![first, second],
            SyncConfig { chunk_size: 2, requeue_failed: false },
        )
        .await;
        enqueue_grades(&outbox, 6).await;

        let outcome = service.upload_pending(GRADES).await.unwrap();

        // Chunk 1 committed, chunk 2 failed, chunk 3 never attempted.
        assert!(outcome.success);
        assert!(outcome.connection_lost);
        assert_eq!(gateway.call_count(), 2);
        assert_eq!(outcome.summary.synced_count, 2);
        assert_eq!(outcome.summary.failed_count, 2);

        let statuses: Vec<OutboxStatus> = {
            let mut out = Vec::new();
            for id in 1..=6 {
                out.push(outbox.get(id).await.unwrap().unwrap().status);
            }
            out
        };
        assert_eq!(
            statuses,
            vec![
                OutboxStatus::Synced,
                OutboxStatus::Synced,
                OutboxStatus::Failed,
                OutboxStatus::Failed,
                OutboxStatus::Pending,
                OutboxStatus::Pending,
            ]
        );

        let failed = outbox.list_failed(GRADES).await.unwrap();
        assert!(failed
            .iter()
            .all(|i| i.error_message.as_deref() == Some("connection interrupted")));

        // Counts reflect only what the run actually got through.
        let entry = sync_log.get(1).await.unwrap().unwrap();
        assert_eq!(entry.success_count, 2);
        assert_eq!(entry.failed_count, 2);
    }

    #[tokio::test]
    async fn run_fails_when_nothing_synced_before_connection_loss() {
        let (service, outbox, sync_log, _gateway) = setup(
            vec![Err(AppError::Network("timeout".to_string()))],
            SyncConfig { chunk_size: 50, requeue_failed: false },
        )
        .await;
        enqueue_grades(&outbox, 3).await;

        let outcome = service.upload_pending(GRADES).await.unwrap();

        assert!(!outcome.success);
        assert!(outcome.connection_lost);
        let entry = sync_log.get(1).await.unwrap().unwrap();
        assert_eq!(entry.status, SyncLogStatus::Failed);
    }

    #[tokio::test]
    async fn conflicts_are_reported_separately_from_failures() {
        let response = Ok(UploadChunkResponse {
            synced: vec!["grade-000".to_string()],
            failed: vec![RejectedRecord {
                data: json!({"id": "grade-001"}),
                error: "score out of range".to_string(),
            }],
            conflicts: vec![ConflictedRecord {
                data: json!({"id": "grade-002"}),
                message: "record modified by another user".to_string(),
            }],
        });
        let (service, outbox, _sync_log, _gateway) = setup(
            vec![response],
            SyncConfig { chunk_size: 50, requeue_failed: false },
        )
        .await;
        enqueue_grades(&outbox, 3).await;

        let outcome = service.upload_pending(GRADES).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.synced, vec!["grade-000"]);
        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(
            outcome.conflicts[0].message,
            "record modified by another user"
        );

        let conflicted = outbox.get(3).await.unwrap().unwrap();
        assert_eq!(conflicted.status, OutboxStatus::Failed);
        assert_eq!(
            conflicted.error_message.as_deref(),
            Some("record modified by another user")
        );
    }

    #[tokio::test]
    async fn unacknowledged_items_are_marked_failed() {
        let response = Ok(UploadChunkResponse {
            synced: vec!["grade-000".to_string()],
            failed: Vec::new(),
            conflicts: Vec::new(),
        });
        let (service, outbox, _sync_log, _gateway) = setup(
            vec![response],
            SyncConfig { chunk_size: 50, requeue_failed: false },
        )
        .await;
        enqueue_grades(&outbox, 2).await;

        let outcome = service.upload_pending(GRADES).await.unwrap();

        assert_eq!(outcome.summary.synced_count, 1);
        assert_eq!(outcome.summary.failed_count, 1);
        let orphan = outbox.get(2).await.unwrap().unwrap();
        assert_eq!(orphan.status, OutboxStatus::Failed);
        assert_eq!(
            orphan.error_message.as_deref(),
            Some("not acknowledged by server")
        );
    }

    #[tokio::test]
    async fn requeue_failed_picks_items_up_on_next_run() {
        let first = Ok(UploadChunkResponse {
            synced: Vec::new(),
            failed: vec![RejectedRecord {
                data: json!({"id": "grade-000"}),
                error: "invalid".to_string(),
            }],
            conflicts: Vec::new(),
        });
        let (service, outbox, _sync_log, gateway) = setup(
            vec![first],
            SyncConfig { chunk_size: 50, requeue_failed: true },
        )
        .await;
        enqueue_grades(&outbox, 1).await;

        let outcome = service.upload_pending(GRADES).await.unwrap();
        assert_eq!(outcome.summary.failed_count, 1);

        // Second run: scripted responses exhausted, the gateway accepts all.
        let outcome = service.upload_pending(GRADES).await.unwrap();
        assert_eq!(outcome.summary.synced_count, 1);
        assert_eq!(gateway.call_count(), 2);
    }
}
