use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::instrument;

use super::{load_request, submit_job, EventHandler, HandlerReport};
use crate::database::Database;
use crate::events::{EventPayload, ScheduledEvent};
use crate::executor::{commands, JobSpec, TrainingExecutor};
use crate::models::ModelCatalog;

pub struct ResetModelHandler {
    database: Arc<Database>,
    executor: Arc<dyn TrainingExecutor>,
    catalog: ModelCatalog,
}

impl ResetModelHandler {
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
}

#[async_trait]
impl EventHandler for ResetModelHandler {
    #[instrument(skip_all, fields(event_id = %event.id))]
    async fn handle(&self, event: &ScheduledEvent) -> HandlerReport {
        let payload = match event.payload() {
            Ok(payload) => payload,
            Err(e) => return e.into(),
        };
        if let Err(e) = payload.validate() {
            return e.into();
        }
        let EventPayload::ResetModel(data) = payload else {
            return HandlerReport::non_retryable("unexpected payload for model reset");
        };

        let request = match load_request(&self.database, data.request_id).await {
            Ok(request) => request,
            Err(report) => return report,
        };

        let root = self.catalog.root().display().to_string();
        let job = JobSpec::new(
            &request.job_name,
            &request.job_id,
            commands::reset_model(&root, &data.model_name),
        );
        submit_job(&self.database, self.executor.as_ref(), &request, job).await
    }
}

pub struct FuseModelHandler {
    database: Arc<Database>,
    executor: Arc<dyn TrainingExecutor>,
    catalog: ModelCatalog,
}

impl FuseModelHandler {
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
}

#[async_trait]
impl EventHandler for FuseModelHandler {
    #[instrument(skip_all, fields(event_id = %event.id))]
    async fn handle(&self, event: &ScheduledEvent) -> HandlerReport {
        let payload = match event.payload() {
            Ok(payload) => payload,
            Err(e) => return e.into(),
        };
        if let Err(e) = payload.validate() {
            return e.into();
        }
        let EventPayload::FuseModel(data) = payload else {
            return HandlerReport::non_retryable("unexpected payload for topic fusion");
        };

        let request = match load_request(&self.database, data.request_id).await {
            Ok(request) => request,
            Err(report) => return report,
        };

        // Sorted and deduplicated
        let topics: Vec<u32> = data
            .topics
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let root = self.catalog.root().display().to_string();
        let job = JobSpec::new(
            &request.job_name,
            &request.job_id,
            commands::fuse_topics(&root, &data.model_name, &topics),
        );
        submit_job(&self.database, self.executor.as_ref(), &request, job).await
    }
}

/// Reorders a model's topics by size
pub struct SortModelHandler {
    database: Arc<Database>,
    executor: Arc<dyn TrainingExecutor>,
    catalog: ModelCatalog,
}

impl SortModelHandler {
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
}

#[async_trait]
impl EventHandler for SortModelHandler {
    #[instrument(skip_all, fields(event_id = %event.id))]
    async fn handle(&self, event: &ScheduledEvent) -> HandlerReport {
        let payload = match event.payload() {
            Ok(payload) => payload,
            Err(e) => return e.into(),
        };
        if let Err(e) = payload.validate() {
            return e.into();
        }
        let EventPayload::SortModel(data) = payload else {
            return HandlerReport::non_retryable("unexpected payload for topic sorting");
        };

        let request = match load_request(&self.database, data.request_id).await {
            Ok(request) => request,
            Err(report) => return report,
        };

        let root = self.catalog.root().display().to_string();
        let job = JobSpec::new(
            &request.job_name,
            &request.job_id,
            commands::sort_topics(&root, &data.model_name),
        );
        submit_job(&self.database, self.executor.as_ref(), &request, job).await
    }
}
