//! Training executor abstraction
//!
//! The executor runs training and model management jobs out of process. The
//! engine only submits jobs, asks for their status and removes finished ones;
//! it never waits for a job to complete.
//!
//! # Architecture
//!
//! ```text
//! Handler → JobSpec → TrainingExecutor::submit → POST {base}/jobs
//!                                                      ↓
//! check-running-tasks → status(job_id) ← GET {base}/jobs/{id}
//!                     → delete(job_id) → DELETE {base}/jobs/{id}
//! ```

pub mod http;

pub use http::HttpTrainingExecutor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::constants::jobs::{EXECUTION_LOG_FILE_NAME, MODEL_CONFIG_FILE_NAME};
use crate::errors::ExecutorError;

/// One job submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub job_name: String,
    pub job_id: String,
    pub commands: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

impl JobSpec {
    pub fn new(job_name: &str, job_id: &str, commands: String) -> Self {
        Self {
            job_name: job_name.to_string(),
            job_id: job_id.to_string(),
            commands,
            log_file: None,
        }
    }

    /// Write the job log next to the model config it trains
    pub fn with_log_next_to(self, config_path: &str) -> Self {
        self.with_log_replacing(config_path, MODEL_CONFIG_FILE_NAME, EXECUTION_LOG_FILE_NAME)
    }

    /// Log path derived from `config_path` by swapping its file name
    pub fn with_log_replacing(
        mut self,
        config_path: &str,
        config_file: &str,
        log_file: &str,
    ) -> Self {
        self.log_file = Some(config_path.replace(config_file, log_file));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Finished,
    Failed,
    Error,
    Killed,
    Unknown(String),
}

impl JobStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "RUNNING" | "PENDING" | "QUEUED" => JobStatus::Running,
            "FINISHED" | "SUCCEEDED" | "COMPLETED" => JobStatus::Finished,
            "FAILED" => JobStatus::Failed,
            "ERROR" => JobStatus::Error,
            "KILLED" => JobStatus::Killed,
            _ => JobStatus::Unknown(value.to_string()),
        }
    }

    #[inline]
    pub fn is_failure(&self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Error | JobStatus::Killed)
    }
}

#[async_trait]
pub trait TrainingExecutor: Send + Sync {
    /// Start a job, returns the executor's job id
    async fn submit(&self, job: &JobSpec) -> Result<String, ExecutorError>;

    async fn status(&self, job_id: &str) -> Result<JobStatus, ExecutorError>;

    async fn delete(&self, job_id: &str) -> Result<(), ExecutorError>;
}

/// Command lines understood by the executor's images
pub mod commands {
    pub fn train_root(config: &str) -> String {
        format!("topicmodeling.py --preproc --train --config {}", config)
    }

    pub fn train_hierarchical(config: &str) -> String {
        format!("topicmodeling.py --train --config {}", config)
    }

    pub fn prepare_hierarchical(parent_config: &str, child_config: &str) -> String {
        format!(
            "topicmodeling.py --hierarchical --config {} --config_child {}",
            parent_config, child_config
        )
    }

    pub fn reset_model(models_root: &str, model_name: &str) -> String {
        format!(
            "manageModels.py --path_TMmodels {} --resetTM {}",
            models_root, model_name
        )
    }

    pub fn sort_topics(models_root: &str, model_name: &str) -> String {
        format!(
            "manageModels.py --path_TMmodels {} --sortTopics {}",
            models_root, model_name
        )
    }

    /// One domain classifier task; every parameter becomes `--key value`
    pub fn domain_task(
        datasets_root: &str,
        model_path: &str,
        task: &str,
        params: &[(String, String)],
    ) -> String {
        let mut command = format!(
            "main_dc_single_task.py --source {} --p {} --task {}",
            datasets_root, model_path, task
        );
        for (key, value) in params {
            command.push_str(&format!(" --{} {}", key, value));
        }
        command
    }

    pub fn fuse_topics(models_root: &str, model_name: &str, topics: &[u32]) -> String {
        let topics = topics
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "manageModels.py --path_TMmodels {} --fuseTopics {} --topics {}",
            models_root, model_name, topics
        )
    }
}
