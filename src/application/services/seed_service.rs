use crate::application::ports::cache_store::CacheStore;
use crate::application::ports::remote_gateway::RemoteGateway;
use crate::application::ports::sync_log_store::SyncLogStore;
use crate::domain::cache::{entity_types, RemoteRecord};
use crate::domain::sync_log::SyncDirection;
use crate::shared::error::AppError;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The ordered download stages. Each stage's correctness is defined
/// relative to entities materialized by earlier stages, so the pipeline
/// never runs a stage whose dependency stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedStage {
    Institution,
    ClassSections,
    AssignedSubjects,
    Students,
    GradableItems,
    RunningGrades,
}

impl SeedStage {
    pub const ORDERED: [SeedStage; 6] = [
        SeedStage::Institution,
        SeedStage::ClassSections,
        SeedStage::AssignedSubjects,
        SeedStage::Students,
        SeedStage::GradableItems,
        SeedStage::RunningGrades,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SeedStage::Institution => "institution",
            SeedStage::ClassSections => "class_sections",
            SeedStage::AssignedSubjects => "assigned_subjects",
            SeedStage::Students => "students",
            SeedStage::GradableItems => "gradable_items",
            SeedStage::RunningGrades => "running_grades",
        }
    }

    pub fn entity_type(&self) -> &'static str {
        match self {
            SeedStage::Institution => entity_types::INSTITUTION,
            SeedStage::ClassSections => entity_types::CLASS_SECTION,
            SeedStage::AssignedSubjects => entity_types::SUBJECT,
            SeedStage::Students => entity_types::STUDENT,
            SeedStage::GradableItems => entity_types::GRADABLE_ITEM,
            SeedStage::RunningGrades => entity_types::STUDENT_RUNNING_GRADE,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: SeedStage,
    pub items: u32,
}

/// Result of one pipeline run. On failure, `completed` still lists the
/// stages whose data landed in the cache and stays queryable.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub success: bool,
    pub completed: Vec<StageReport>,
    pub failed_stage: Option<SeedStage>,
    pub error: Option<String>,
}

/// Populates the local cache from the remote system after authentication.
/// Every stage is an idempotent fetch-and-upsert; re-running the pipeline
/// is always safe.
pub struct SeedPipeline {
    cache: Arc<dyn CacheStore>,
    gateway: Arc<dyn RemoteGateway>,
    sync_log: Arc<dyn SyncLogStore>,
    run_gate: Mutex<()>,
}

impl SeedPipeline {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        gateway: Arc<dyn RemoteGateway>,
        sync_log: Arc<dyn SyncLogStore>,
    ) -> Self {
        Self {
            cache,
            gateway,
            sync_log,
            run_gate: Mutex::new(()),
        }
    }

    /// Runs all stages in order, halting at the first failure.
    pub async fn run(&self) -> Result<PipelineOutcome, AppError> {
        let _guard = self
            .run_gate
            .try_lock()
            .map_err(|_| AppError::SyncInProgress)?;

        let mut completed = Vec::new();

        for stage in SeedStage::ORDERED {
            let log_id = self
                .sync_log
                .create(stage.entity_type(), SyncDirection::Download)
                .await?;

            match self.run_stage(stage).await {
                Ok(items) => {
                    self.sync_log.complete(log_id, items, 0).await?;
                    tracing::info!(
                        target: "sync::seed",
                        stage = stage.name(),
                        items,
                        "seed stage completed"
                    );
                    completed.push(StageReport { stage, items });
                }
                Err(err) => {
                    let message = err.to_string();
                    self.sync_log.fail(log_id, &message).await?;
                    tracing::error!(
                        target: "sync::seed",
                        stage = stage.name(),
                        error = %message,
                        "seed stage failed, halting pipeline"
                    );
                    return Ok(PipelineOutcome {
                        success: false,
                        completed,
                        failed_stage: Some(stage),
                        error: Some(message),
                    });
                }
            }
        }

        Ok(PipelineOutcome {
            success: true,
            completed,
            failed_stage: None,
            error: None,
        })
    }

    async fn run_stage(&self, stage: SeedStage) -> Result<u32, AppError> {
        let records = match stage {
            SeedStage::Institution => self.gateway.fetch_institution().await?,
            SeedStage::ClassSections => self.gateway.fetch_class_sections().await?,
            SeedStage::AssignedSubjects => {
                let loads = self.gateway.fetch_assigned_subjects().await?;
                self.upsert_load_references(&loads).await?;
                loads
            }
            SeedStage::Students => {
                let sections = self.cached_ids(entity_types::CLASS_SECTION).await?;
                self.gateway.fetch_students(&sections).await?
            }
            SeedStage::GradableItems => {
                let subjects = self.cached_ids(entity_types::SUBJECT).await?;
                self.gateway.fetch_gradable_items(&subjects).await?
            }
            SeedStage::RunningGrades => {
                let sections = self.cached_ids(entity_types::CLASS_SECTION).await?;
                self.gateway.fetch_running_grades(&sections).await?
            }
        };

        self.cache.upsert_many(stage.entity_type(), &records).await
    }

    /// A teaching load embeds the class section and teacher it refers to;
    /// both are upserted alongside the load so later stages can rely on
    /// them being present.
    async fn upsert_load_references(&self, loads: &[RemoteRecord]) -> Result<(), AppError> {
        for load in loads {
            for (key, entity_type) in [
                ("class_section", entity_types::CLASS_SECTION),
                ("teacher", entity_types::USER),
            ] {
                if let Some(embedded) = load.payload.get(key) {
                    if let Some(record) = RemoteRecord::from_value(embedded.clone()) {
                        self.cache
                            .upsert(entity_type, &record.id, &record.payload)
                            .await?;
                    }
                }
            }
        }
        Ok(())
    }

    async fn cached_ids(&self, entity_type: &str) -> Result<Vec<String>, AppError> {
        let entries = self.cache.list(entity_type).await?;
        Ok(entries.into_iter().map(|e| e.entity_id).collect())
    }
}
