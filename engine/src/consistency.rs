//! Consistency checks run right before an event is executed.
//!
//! A checker answers whether the event's preconditions still hold. A negative
//! answer cancels the event; an error leaves it untouched for the next tick.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::config::CheckImportsConfig;
use crate::database::{CorpusImportStatus, Database, TrainingTaskStatus};
use crate::events::{EventPayload, ScheduledEvent, ScheduledEventType};
use crate::models::ModelCatalog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Consistency {
    Consistent,
    Inconsistent(String),
}

impl Consistency {
    pub fn is_consistent(&self) -> bool {
        matches!(self, Consistency::Consistent)
    }
}

#[async_trait]
pub trait ConsistencyChecker: Send + Sync {
    async fn check(&self, event: &ScheduledEvent) -> Result<Consistency>;
}

pub struct AlwaysConsistent;

#[async_trait]
impl ConsistencyChecker for AlwaysConsistent {
    async fn check(&self, _event: &ScheduledEvent) -> Result<Consistency> {
        Ok(Consistency::Consistent)
    }
}

async fn request_is_new(database: &Database, request_id: Uuid) -> Result<Consistency> {
    match database.get_training_request(request_id).await? {
        None => Ok(Consistency::Inconsistent(format!(
            "training request {} no longer exists",
            request_id
        ))),
        Some(request) if request.status != TrainingTaskStatus::New => {
            Ok(Consistency::Inconsistent(format!(
                "training request {} is {}",
                request_id, request.status
            )))
        }
        Some(_) => Ok(Consistency::Consistent),
    }
}

async fn model_exists(catalog: &ModelCatalog, name: &str) -> Result<Consistency> {
    if catalog.exists(name).await? {
        Ok(Consistency::Consistent)
    } else {
        Ok(Consistency::Inconsistent(format!("model {} not found", name)))
    }
}

/// Training request is still NEW; hierarchical preparation also needs its parent model
pub struct TrainingRequestChecker {
    database: Arc<Database>,
    catalog: ModelCatalog,
}

impl TrainingRequestChecker {
    pub fn new(database: Arc<Database>, catalog: ModelCatalog) -> Self {
        Self { database, catalog }
    }
}

#[async_trait]
impl ConsistencyChecker for TrainingRequestChecker {
    async fn check(&self, event: &ScheduledEvent) -> Result<Consistency> {
        // Undecodable payloads fail in the handler
        let Ok(payload) = event.payload() else {
            return Ok(Consistency::Consistent);
        };
        let Some(request_id) = payload.request_id() else {
            return Ok(Consistency::Consistent);
        };

        let verdict = request_is_new(&self.database, request_id).await?;
        if !verdict.is_consistent() {
            return Ok(verdict);
        }

        if let EventPayload::PrepareHierarchicalTraining(data) = &payload {
            return model_exists(&self.catalog, &data.parent_model).await;
        }
        Ok(Consistency::Consistent)
    }
}

/// Reset, fuse and sort: request still NEW and the model still in the catalog
pub struct ModelTaskChecker {
    database: Arc<Database>,
    catalog: ModelCatalog,
}

impl ModelTaskChecker {
    pub fn new(database: Arc<Database>, catalog: ModelCatalog) -> Self {
        Self { database, catalog }
    }
}

#[async_trait]
impl ConsistencyChecker for ModelTaskChecker {
    async fn check(&self, event: &ScheduledEvent) -> Result<Consistency> {
        let (request_id, model_name) = match event.payload() {
            Ok(EventPayload::ResetModel(data)) | Ok(EventPayload::SortModel(data)) => {
                (data.request_id, data.model_name)
            }
            Ok(EventPayload::FuseModel(data)) => (data.request_id, data.model_name),
            _ => return Ok(Consistency::Consistent),
        };

        let verdict = request_is_new(&self.database, request_id).await?;
        if !verdict.is_consistent() {
            return Ok(verdict);
        }
        model_exists(&self.catalog, &model_name).await
    }
}

pub struct ImportScannerConfigured {
    config: CheckImportsConfig,
}

impl ImportScannerConfigured {
    pub fn new(config: CheckImportsConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ConsistencyChecker for ImportScannerConfigured {
    async fn check(&self, _event: &ScheduledEvent) -> Result<Consistency> {
        if self.config.is_usable() {
            Ok(Consistency::Consistent)
        } else {
            Ok(Consistency::Inconsistent(
                "import scanning is not configured".to_string(),
            ))
        }
    }
}

pub struct ImportStillDetected {
    database: Arc<Database>,
}

impl ImportStillDetected {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }
}

#[async_trait]
impl ConsistencyChecker for ImportStillDetected {
    async fn check(&self, event: &ScheduledEvent) -> Result<Consistency> {
        let Ok(EventPayload::ImportDetected(data)) = event.payload() else {
            return Ok(Consistency::Consistent);
        };

        match self.database.get_corpus_import(data.import_id).await? {
            Some(import) if import.status == CorpusImportStatus::Detected => {
                Ok(Consistency::Consistent)
            }
            Some(import) => Ok(Consistency::Inconsistent(format!(
                "corpus import {} is {}",
                import.id,
                import.status.as_str()
            ))),
            None => Ok(Consistency::Inconsistent(format!(
                "corpus import {} no longer exists",
                data.import_id
            ))),
        }
    }
}

/// Checker per event type, built once at startup
#[derive(Default)]
pub struct ConsistencyRegistry {
    checkers: HashMap<ScheduledEventType, Arc<dyn ConsistencyChecker>>,
}

impl ConsistencyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn standard(
        database: Arc<Database>,
        catalog: ModelCatalog,
        imports: CheckImportsConfig,
    ) -> Self {
        let training: Arc<dyn ConsistencyChecker> = Arc::new(TrainingRequestChecker::new(
            database.clone(),
            catalog.clone(),
        ));
        let model_task: Arc<dyn ConsistencyChecker> =
            Arc::new(ModelTaskChecker::new(database.clone(), catalog));

        let mut registry = Self::new()
            .with(ScheduledEventType::CheckRunningTasks, Arc::new(AlwaysConsistent))
            .with(ScheduledEventType::RunTraining, training.clone())
            .with(ScheduledEventType::RunHierarchicalTraining, training.clone())
            .with(ScheduledEventType::PrepareHierarchicalTraining, training.clone())
            .with(ScheduledEventType::ResetModel, model_task.clone())
            .with(ScheduledEventType::FuseModel, model_task.clone())
            .with(ScheduledEventType::SortModel, model_task)
            .with(
                ScheduledEventType::CheckForImports,
                Arc::new(ImportScannerConfigured::new(imports)),
            )
            .with(
                ScheduledEventType::ImportDetected,
                Arc::new(ImportStillDetected::new(database)),
            );

        // Domain requests only need to be NEW
        for event_type in ScheduledEventType::DOMAIN {
            registry = registry.with(event_type, training.clone());
        }
        registry
    }

    pub fn with(
        mut self,
        event_type: ScheduledEventType,
        checker: Arc<dyn ConsistencyChecker>,
    ) -> Self {
        self.checkers.insert(event_type, checker);
        self
    }

    pub async fn check(&self, event: &ScheduledEvent) -> Result<Consistency> {
        match self.checkers.get(&event.event_type) {
            Some(checker) => checker.check(event).await,
            None => {
                debug!("No consistency checker for {}", event.event_type);
                Ok(Consistency::Consistent)
            }
        }
    }
}
