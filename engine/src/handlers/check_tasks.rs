use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use super::{EventHandler, HandlerReport};
use crate::constants::identity::{
    CHECK_TASKS_KEY, HOUSEKEEPING_KEY_TYPE, SYSTEM_CREATOR, TRAINING_REQUEST_KEY_TYPE,
};
use crate::constants::jobs::TRAIN_TOPIC_MODELS;
use crate::constants::limits::MAX_CONCURRENT_STATUS_QUERIES;
use crate::database::{Database, TrainingTaskRequest, TrainingTaskStatus};
use crate::events::{CheckTasksData, EventPayload, PublishData, RunTrainingData, ScheduledEvent};
use crate::executor::{JobStatus, TrainingExecutor};
use crate::policy::bounded_seconds;

/// Child config of a finished hierarchical preparation, stored as `parent,child`
fn prepared_child_config(config: &str) -> Option<&str> {
    let (parent, child) = config.split_once(',')?;
    let child = child.trim();
    if parent.trim().is_empty() || child.is_empty() || child.contains(',') {
        return None;
    }
    Some(child)
}

/// Reconciles RUNNING training requests with the executor and re-arms itself
pub struct CheckRunningTasksHandler {
    database: Arc<Database>,
    executor: Arc<dyn TrainingExecutor>,
    check_interval_seconds: u64,
}

impl CheckRunningTasksHandler {
    pub fn new(
        database: Arc<Database>,
        executor: Arc<dyn TrainingExecutor>,
        check_interval_seconds: u64,
    ) -> Self {
        Self {
            database,
            executor,
            check_interval_seconds,
        }
    }

    fn next_check(&self, previous: &ScheduledEvent) -> Option<PublishData> {
        let payload = EventPayload::CheckRunningTasks(CheckTasksData {
            previous_checking_event: Some(previous.id),
        });
        let now = Utc::now();
        let run_at = now
            .checked_add_signed(bounded_seconds(self.check_interval_seconds))
            .unwrap_or(now);
        match PublishData::from_payload(
            &payload,
            CHECK_TASKS_KEY,
            HOUSEKEEPING_KEY_TYPE,
            run_at,
            SYSTEM_CREATOR,
        ) {
            Ok(data) => Some(data),
            Err(e) => {
                error!("Failed to build next running-tasks check: {}", e);
                None
            }
        }
    }

    /// Store the child training request and announce it
    async fn chain_hierarchical(&self, prepared: &TrainingTaskRequest) -> Option<PublishData> {
        let child_config = prepared_child_config(&prepared.config)?;
        let request = TrainingTaskRequest::new(TRAIN_TOPIC_MODELS, child_config);
        if let Err(e) = self.database.store_training_request(&request).await {
            error!(
                "Failed to store hierarchical training after preparation {}: {}",
                prepared.id, e
            );
            return None;
        }

        let payload = EventPayload::RunHierarchicalTraining(RunTrainingData {
            training_task_request_id: request.id,
            corpus_id: None,
            parameters: None,
        });
        match PublishData::from_payload(
            &payload,
            request.id.to_string(),
            TRAINING_REQUEST_KEY_TYPE,
            Utc::now(),
            SYSTEM_CREATOR,
        ) {
            Ok(data) => {
                info!(
                    "Preparation {} finished, hierarchical training requested as {}",
                    prepared.id, request.id
                );
                Some(data)
            }
            Err(e) => {
                error!("Failed to build hierarchical training for {}: {}", request.id, e);
                None
            }
        }
    }

    async fn reconcile(
        &self,
        request: &TrainingTaskRequest,
        status: Option<JobStatus>,
    ) -> Option<PublishData> {
        let finished = match status {
            Some(JobStatus::Running) => return None,
            Some(JobStatus::Unknown(value)) => {
                warn!(
                    "Job {} of request {} reported unknown status '{}', leaving it",
                    request.job_id, request.id, value
                );
                return None;
            }
            Some(JobStatus::Finished) => TrainingTaskStatus::Completed,
            Some(_) | None => TrainingTaskStatus::Error,
        };

        let applied = match self.database.finish_training_request(request.id, finished).await {
            Ok(true) => {
                info!("Request {} ({}) is {}", request.id, request.job_name, finished);
                true
            }
            Ok(false) => {
                debug!("Request {} was already reconciled", request.id);
                false
            }
            Err(e) => {
                error!("Failed to update request {}: {}", request.id, e);
                return None;
            }
        };

        if let Err(e) = self.executor.delete(&request.job_id).await {
            warn!("Failed to delete executor job {}: {}", request.job_id, e);
        }

        if applied && finished == TrainingTaskStatus::Completed {
            self.chain_hierarchical(request).await
        } else {
            None
        }
    }
}

#[async_trait]
impl EventHandler for CheckRunningTasksHandler {
    #[instrument(skip_all, fields(event_id = %event.id))]
    async fn handle(&self, event: &ScheduledEvent) -> HandlerReport {
        let running = match self
            .database
            .get_training_requests_by_status(TrainingTaskStatus::Running)
            .await
        {
            Ok(running) => running,
            Err(e) => {
                let report = HandlerReport::non_retryable(format!(
                    "failed to list running requests: {}",
                    e
                ));
                return match self.next_check(event) {
                    Some(next) => report.with_follow_up(next),
                    None => report,
                };
            }
        };

        debug!("Checking {} running training requests", running.len());

        let executor = &self.executor;
        let statuses: Vec<(TrainingTaskRequest, Option<JobStatus>)> = stream::iter(running)
            .map(|request| async move {
                let status = match executor.status(&request.job_id).await {
                    Ok(status) => Some(status),
                    Err(e) => {
                        warn!("Status query for request {} failed: {}", request.id, e);
                        None
                    }
                };
                (request, status)
            })
            .buffer_unordered(MAX_CONCURRENT_STATUS_QUERIES)
            .collect()
            .await;

        let mut report = HandlerReport::success();
        for (request, status) in &statuses {
            if let Some(follow_up) = self.reconcile(request, status.clone()).await {
                report = report.with_follow_up(follow_up);
            }
        }

        match self.next_check(event) {
            Some(next) => report.with_follow_up(next),
            None => report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_two_part_configs_are_chained() {
        assert_eq!(
            prepared_child_config("/models/root/trainconfig.json, /models/child/trainconfig.json"),
            Some("/models/child/trainconfig.json")
        );
        assert_eq!(prepared_child_config("/models/root/trainconfig.json"), None);
        assert_eq!(prepared_child_config(",/models/child/trainconfig.json"), None);
        assert_eq!(prepared_child_config("/a,/b,/c"), None);
        assert_eq!(prepared_child_config("/a, "), None);
    }
}
