use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

use super::{load_request, submit_job, EventHandler, HandlerReport};
use crate::database::Database;
use crate::events::{EventPayload, ScheduledEvent};
use crate::executor::{commands, JobSpec, TrainingExecutor};
use crate::models::ModelCatalog;

/// Root and hierarchical topic model training
pub struct RunTrainingHandler {
    database: Arc<Database>,
    executor: Arc<dyn TrainingExecutor>,
}

impl RunTrainingHandler {
    pub fn new(database: Arc<Database>, executor: Arc<dyn TrainingExecutor>) -> Self {
        Self { database, executor }
    }
}

#[async_trait]
impl EventHandler for RunTrainingHandler {
    #[instrument(skip_all, fields(event_id = %event.id, event_type = %event.event_type))]
    async fn handle(&self, event: &ScheduledEvent) -> HandlerReport {
        let (data, hierarchical) = match event.payload() {
            Ok(EventPayload::RunTraining(data)) => (data, false),
            Ok(EventPayload::RunHierarchicalTraining(data)) => (data, true),
            Ok(other) => {
                return HandlerReport::non_retryable(format!(
                    "unexpected {} payload for training",
                    other.event_type()
                ))
            }
            Err(e) => return e.into(),
        };

        let request = match load_request(&self.database, data.training_task_request_id).await {
            Ok(request) => request,
            Err(report) => return report,
        };

        let command = if hierarchical {
            commands::train_hierarchical(&request.config)
        } else {
            commands::train_root(&request.config)
        };
        let job = JobSpec::new(&request.job_name, &request.job_id, command)
            .with_log_next_to(&request.config);

        submit_job(&self.database, self.executor.as_ref(), &request, job).await
    }
}

/// First stage of a hierarchical training: derive the child model from its parent
pub struct PrepareHierarchicalHandler {
    database: Arc<Database>,
    executor: Arc<dyn TrainingExecutor>,
    catalog: ModelCatalog,
}

impl PrepareHierarchicalHandler {
    pub fn new(
        database: Arc<Database>,
        executor: Arc<dyn TrainingExecutor>,
        catalog: ModelCatalog,
    ) -> Self {
        Self {
            database,
            executor,
            catalog,
        }
    }

    /// Request config is `parent,child`; fall back to the catalog layout
    fn configs(&self, stored: &str, parent: &str, child: &str) -> Option<(String, String)> {
        if let Some((parent_config, child_config)) = stored.split_once(',') {
            if !parent_config.trim().is_empty() && !child_config.trim().is_empty() {
                return Some((
                    parent_config.trim().to_string(),
                    child_config.trim().to_string(),
                ));
            }
        }
        let parent_config = self.catalog.config_path(parent)?;
        let child_config = self.catalog.config_path(child)?;
        Some((
            parent_config.display().to_string(),
            child_config.display().to_string(),
        ))
    }
}

#[async_trait]
impl EventHandler for PrepareHierarchicalHandler {
    #[instrument(skip_all, fields(event_id = %event.id))]
    async fn handle(&self, event: &ScheduledEvent) -> HandlerReport {
        let payload = match event.payload() {
            Ok(payload) => payload,
            Err(e) => return e.into(),
        };
        if let Err(e) = payload.validate() {
            return e.into();
        }
        let EventPayload::PrepareHierarchicalTraining(data) = payload else {
            return HandlerReport::non_retryable("unexpected payload for hierarchical preparation");
        };

        let request = match load_request(&self.database, data.training_task_request_id).await {
            Ok(request) => request,
            Err(report) => return report,
        };

        let Some((parent_config, child_config)) =
            self.configs(&request.config, &data.parent_model, &data.child_model)
        else {
            return HandlerReport::non_retryable(format!(
                "invalid model names {} / {}",
                data.parent_model, data.child_model
            ));
        };

        let job = JobSpec::new(
            &request.job_name,
            &request.job_id,
            commands::prepare_hierarchical(&parent_config, &child_config),
        )
        .with_log_next_to(&child_config);

        submit_job(&self.database, self.executor.as_ref(), &request, job).await
    }
}
