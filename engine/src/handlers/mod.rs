//! Event handlers
//!
//! One handler per event type, looked up by the dispatcher. Handlers never
//! return errors: every failure is reported as an outcome so the retry policy
//! can decide what happens next. Events a handler wants published after the
//! current one is finalized go into `follow_ups`.

pub mod check_tasks;
pub mod domain;
pub mod imports;
pub mod models;
pub mod training;

pub use check_tasks::CheckRunningTasksHandler;
pub use domain::DomainTaskHandler;
pub use imports::{CheckForImportsHandler, ImportDetectedHandler};
pub use models::{FuseModelHandler, ResetModelHandler, SortModelHandler};
pub use training::{PrepareHierarchicalHandler, RunTrainingHandler};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::database::{Database, TrainingTaskRequest};
use crate::errors::{ExecutorError, PayloadError};
use crate::events::{PublishData, ScheduledEvent, ScheduledEventType};
use crate::executor::{JobSpec, TrainingExecutor};
use crate::imports::ImportScanner;
use crate::models::ModelCatalog;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    Success,
    RetryableFailure(String),
    NonRetryableFailure(String),
}

#[derive(Debug, Clone)]
pub struct HandlerReport {
    pub outcome: HandlerOutcome,
    pub follow_ups: Vec<PublishData>,
}

impl HandlerReport {
    pub fn success() -> Self {
        Self::from(HandlerOutcome::Success)
    }

    pub fn retryable(message: impl Into<String>) -> Self {
        Self::from(HandlerOutcome::RetryableFailure(message.into()))
    }

    pub fn non_retryable(message: impl Into<String>) -> Self {
        Self::from(HandlerOutcome::NonRetryableFailure(message.into()))
    }

    pub fn with_follow_up(mut self, data: PublishData) -> Self {
        self.follow_ups.push(data);
        self
    }
}

impl From<HandlerOutcome> for HandlerReport {
    fn from(outcome: HandlerOutcome) -> Self {
        Self {
            outcome,
            follow_ups: Vec::new(),
        }
    }
}

impl From<PayloadError> for HandlerReport {
    fn from(error: PayloadError) -> Self {
        HandlerReport::non_retryable(error.to_string())
    }
}

impl From<ExecutorError> for HandlerReport {
    fn from(error: ExecutorError) -> Self {
        if error.is_transient() {
            HandlerReport::retryable(error.to_string())
        } else {
            HandlerReport::non_retryable(error.to_string())
        }
    }
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &ScheduledEvent) -> HandlerReport;
}

/// Handler per event type, built once at startup
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<ScheduledEventType, Arc<dyn EventHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every handler of the engine. On-demand scans are only registered
    /// when an import scanner is configured.
    pub fn standard(
        database: Arc<Database>,
        executor: Arc<dyn TrainingExecutor>,
        catalog: ModelCatalog,
        scanner: Option<Arc<ImportScanner>>,
        config: &Config,
    ) -> Self {
        let training: Arc<dyn EventHandler> =
            Arc::new(RunTrainingHandler::new(database.clone(), executor.clone()));

        let mut registry = Self::new()
            .with(
                ScheduledEventType::CheckRunningTasks,
                Arc::new(CheckRunningTasksHandler::new(
                    database.clone(),
                    executor.clone(),
                    config.events.check_tasks.check_interval_in_seconds,
                )),
            )
            .with(ScheduledEventType::RunTraining, training.clone())
            .with(ScheduledEventType::RunHierarchicalTraining, training)
            .with(
                ScheduledEventType::PrepareHierarchicalTraining,
                Arc::new(PrepareHierarchicalHandler::new(
                    database.clone(),
                    executor.clone(),
                    catalog.clone(),
                )),
            )
            .with(
                ScheduledEventType::ResetModel,
                Arc::new(ResetModelHandler::new(
                    database.clone(),
                    executor.clone(),
                    catalog.clone(),
                )),
            )
            .with(
                ScheduledEventType::FuseModel,
                Arc::new(FuseModelHandler::new(
                    database.clone(),
                    executor.clone(),
                    catalog.clone(),
                )),
            )
            .with(
                ScheduledEventType::SortModel,
                Arc::new(SortModelHandler::new(
                    database.clone(),
                    executor.clone(),
                    catalog,
                )),
            )
            .with(
                ScheduledEventType::ImportDetected,
                Arc::new(ImportDetectedHandler::new(database.clone())),
            );

        let domain: Arc<dyn EventHandler> =
            Arc::new(DomainTaskHandler::new(database, executor, &config.models));
        for event_type in ScheduledEventType::DOMAIN {
            registry = registry.with(event_type, domain.clone());
        }

        match scanner {
            Some(scanner) => {
                registry = registry.with(
                    ScheduledEventType::CheckForImports,
                    Arc::new(CheckForImportsHandler::new(scanner)),
                );
            }
            None => warn!("Import scanning not configured, CHECK_FOR_IMPORTS events will be canceled"),
        }
        registry
    }

    pub fn with(mut self, event_type: ScheduledEventType, handler: Arc<dyn EventHandler>) -> Self {
        self.handlers.insert(event_type, handler);
        self
    }

    pub fn get(&self, event_type: ScheduledEventType) -> Option<Arc<dyn EventHandler>> {
        self.handlers.get(&event_type).cloned()
    }

    pub fn registered(&self) -> Vec<ScheduledEventType> {
        ScheduledEventType::ALL
            .into_iter()
            .filter(|t| self.handlers.contains_key(t))
            .collect()
    }
}

/// Load the request an event acts on
pub(crate) async fn load_request(
    database: &Database,
    request_id: uuid::Uuid,
) -> Result<TrainingTaskRequest, HandlerReport> {
    match database.get_training_request(request_id).await {
        Ok(Some(request)) => Ok(request),
        Ok(None) => Err(HandlerReport::non_retryable(format!(
            "training request {} not found",
            request_id
        ))),
        Err(e) => Err(HandlerReport::retryable(format!(
            "failed to load training request {}: {}",
            request_id, e
        ))),
    }
}

/// Submit a job for `request` and mark the request RUNNING
pub(crate) async fn submit_job(
    database: &Database,
    executor: &dyn TrainingExecutor,
    request: &TrainingTaskRequest,
    job: JobSpec,
) -> HandlerReport {
    let job_id = match executor.submit(&job).await {
        Ok(job_id) => job_id,
        Err(e) => {
            warn!("Executor refused job for request {}: {}", request.id, e);
            return HandlerReport::from(e);
        }
    };

    match database.mark_training_request_running(request.id, &job_id).await {
        Ok(true) => {
            info!(
                "Request {} running as {} job {}",
                request.id, job.job_name, job_id
            );
            HandlerReport::success()
        }
        Ok(false) => {
            // Job is already on the executor; a retry would start it twice
            warn!(
                "Request {} changed while job {} was submitted",
                request.id, job_id
            );
            HandlerReport::success()
        }
        Err(e) => HandlerReport::non_retryable(format!(
            "job {} started but request {} could not be updated: {}",
            job_id, request.id, e
        )),
    }
}
