//! Domain classifier jobs: the root training and the curation tasks run on a
//! trained domain model. One handler serves every domain event type.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{load_request, submit_job, EventHandler, HandlerReport};
use crate::config::ModelsConfig;
use crate::constants::jobs::{
    DOMAIN_CLASSIFY_LOG_FILE_NAME, DOMAIN_EVALUATE_LOG_FILE_NAME, DOMAIN_FEEDBACK_LOG_FILE_NAME,
    DOMAIN_MODEL_CONFIG_FILE_NAME, DOMAIN_RETRAIN_LOG_FILE_NAME, DOMAIN_SAMPLE_LOG_FILE_NAME,
    EXECUTION_LOG_FILE_NAME, ZERO_SHOT_TASK,
};
use crate::database::Database;
use crate::events::{DomainTaskRequest, EventPayload, ScheduledEvent, ScheduledEventType};
use crate::executor::{commands, JobSpec, TrainingExecutor};
use crate::models::ModelCatalog;

/// Task name, accepted parameter prefixes and log file of one event type
#[derive(Debug, PartialEq)]
struct TaskPlan {
    task: String,
    prefixes: &'static [&'static str],
    log_file: &'static str,
}

impl TaskPlan {
    fn for_event(event_type: ScheduledEventType, request: &DomainTaskRequest) -> Option<Self> {
        let fixed = |task: &str, prefixes: &'static [&'static str], log_file: &'static str| {
            Some(TaskPlan {
                task: task.to_string(),
                prefixes,
                log_file,
            })
        };
        match event_type {
            ScheduledEventType::RunDomainTraining => {
                let task = request.task.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
                fixed(task, &["DC.", "classifier.", "AL."], EXECUTION_LOG_FILE_NAME)
            }
            ScheduledEventType::RetrainDomainModel => {
                fixed("on_retrain", &["classifier."], DOMAIN_RETRAIN_LOG_FILE_NAME)
            }
            ScheduledEventType::ClassifyDomainModel => {
                fixed("on_classify", &[], DOMAIN_CLASSIFY_LOG_FILE_NAME)
            }
            ScheduledEventType::EvaluateDomainModel => {
                fixed("on_evaluate", &["evaluator."], DOMAIN_EVALUATE_LOG_FILE_NAME)
            }
            ScheduledEventType::SampleDomainModel => {
                fixed("on_sample", &["sampler."], DOMAIN_SAMPLE_LOG_FILE_NAME)
            }
            ScheduledEventType::GiveFeedbackDomainModel => {
                fixed("on_save_feedback", &[], DOMAIN_FEEDBACK_LOG_FILE_NAME)
            }
            _ => None,
        }
    }
}

/// Parameters under one of `prefixes`, with the prefix removed
fn prefixed(parameters: &BTreeMap<String, String>, prefixes: &[&str]) -> Vec<(String, String)> {
    parameters
        .iter()
        .filter_map(|(key, value)| {
            prefixes
                .iter()
                .find_map(|prefix| key.strip_prefix(prefix))
                .filter(|stripped| !stripped.is_empty())
                .map(|stripped| (stripped.to_string(), value.clone()))
        })
        .collect()
}

pub struct DomainTaskHandler {
    database: Arc<Database>,
    executor: Arc<dyn TrainingExecutor>,
    catalog: ModelCatalog,
    datasets_path: String,
    zero_shot_model_path: String,
}

impl DomainTaskHandler {
    pub fn new(
        database: Arc<Database>,
        executor: Arc<dyn TrainingExecutor>,
        models: &ModelsConfig,
    ) -> Self {
        Self {
            database,
            executor,
            catalog: ModelCatalog::new(&models.domain_models_path),
            datasets_path: models.datasets_path.clone(),
            zero_shot_model_path: models.zero_shot_model_path.clone(),
        }
    }

    fn parameters(
        &self,
        event_type: ScheduledEventType,
        plan: &TaskPlan,
        request: &DomainTaskRequest,
    ) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if event_type == ScheduledEventType::RunDomainTraining {
            let keywords = request.keywords.as_deref().unwrap_or("").trim();
            params.push((
                "corpus_name".to_string(),
                request.corpus.clone().unwrap_or_default(),
            ));
            params.push((
                "tag".to_string(),
                request.tag.clone().unwrap_or_else(|| request.name.clone()),
            ));
            params.push(("keywords".to_string(), format!("\"{}\"", keywords)));
            if plan.task == ZERO_SHOT_TASK {
                params.push(("zeroshot".to_string(), self.zero_shot_model_path.clone()));
            }
        }
        params.extend(prefixed(&request.parameters, plan.prefixes));
        params
    }
}

#[async_trait]
impl EventHandler for DomainTaskHandler {
    #[instrument(skip_all, fields(event_id = %event.id, event_type = %event.event_type))]
    async fn handle(&self, event: &ScheduledEvent) -> HandlerReport {
        let payload = match event.payload() {
            Ok(payload) => payload,
            Err(e) => return e.into(),
        };
        if let Err(e) = payload.validate() {
            return e.into();
        }
        let EventPayload::Domain(event_type, data) = payload else {
            return HandlerReport::non_retryable("unexpected payload for domain task");
        };
        let Some(plan) = TaskPlan::for_event(event_type, &data.request) else {
            return HandlerReport::non_retryable(format!("{} is not a domain task", event_type));
        };
        let Some(model_path) = self.catalog.model_path(&data.request.name) else {
            return HandlerReport::non_retryable(format!(
                "invalid domain model name {:?}",
                data.request.name
            ));
        };

        let request = match load_request(&self.database, data.training_task_request_id).await {
            Ok(request) => request,
            Err(report) => return report,
        };

        let params = self.parameters(event_type, &plan, &data.request);
        debug!(
            "Domain task {} on {} with {} parameter(s)",
            plan.task,
            data.request.name,
            params.len()
        );
        let job = JobSpec::new(
            &request.job_name,
            &request.job_id,
            commands::domain_task(
                &self.datasets_path,
                &model_path.display().to_string(),
                &plan.task,
                &params,
            ),
        )
        .with_log_replacing(&request.config, DOMAIN_MODEL_CONFIG_FILE_NAME, plan.log_file);

        submit_job(&self.database, self.executor.as_ref(), &request, job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(task: Option<&str>) -> DomainTaskRequest {
        DomainTaskRequest {
            name: "energy-dc".to_string(),
            task: task.map(str::to_string),
            parameters: BTreeMap::from([
                ("DC.max_imbalance".to_string(), "3".to_string()),
                ("classifier.epochs".to_string(), "5".to_string()),
                ("sampler.n_samples".to_string(), "20".to_string()),
                ("evaluator.".to_string(), "ignored".to_string()),
            ]),
            ..DomainTaskRequest::default()
        }
    }

    #[test]
    fn curation_tasks_have_fixed_names() {
        let plan = TaskPlan::for_event(ScheduledEventType::SampleDomainModel, &request(None));
        assert_eq!(
            plan,
            Some(TaskPlan {
                task: "on_sample".to_string(),
                prefixes: &["sampler."],
                log_file: DOMAIN_SAMPLE_LOG_FILE_NAME,
            })
        );
        assert!(TaskPlan::for_event(ScheduledEventType::SortModel, &request(None)).is_none());
    }

    #[test]
    fn training_task_comes_from_the_request() {
        let untasked = TaskPlan::for_event(ScheduledEventType::RunDomainTraining, &request(None));
        assert!(untasked.is_none());
        let plan = TaskPlan::for_event(
            ScheduledEventType::RunDomainTraining,
            &request(Some("on_create_list_of_keywords")),
        )
        .unwrap();
        assert_eq!(plan.task, "on_create_list_of_keywords");
    }

    #[test]
    fn prefixes_are_stripped_and_filtered() {
        let params = prefixed(&request(None).parameters, &["DC.", "classifier.", "AL."]);
        assert_eq!(
            params,
            vec![
                ("max_imbalance".to_string(), "3".to_string()),
                ("epochs".to_string(), "5".to_string()),
            ]
        );
        assert!(prefixed(&request(None).parameters, &[]).is_empty());
    }
}
