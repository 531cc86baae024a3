//! In-process training executor with scripted answers
//!
//! Records every call so tests can assert how often the engine reached the
//! executor, without running an HTTP server.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use engine::errors::ExecutorError;
use engine::executor::{JobSpec, JobStatus, TrainingExecutor};

#[derive(Default)]
pub struct FakeExecutor {
    submit_results: Mutex<VecDeque<Result<String, ExecutorError>>>,
    statuses: Mutex<HashMap<String, Result<JobStatus, ExecutorError>>>,
    submitted: Mutex<Vec<JobSpec>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next submit fails with a 503
    pub fn fail_next_submit_transiently(&self) {
        self.submit_results
            .lock()
            .unwrap()
            .push_back(Err(ExecutorError::Unavailable {
                url: "http://executor/jobs".to_string(),
                status: 503,
            }));
    }

    /// Next submit is refused with a 400
    pub fn reject_next_submit(&self) {
        self.submit_results
            .lock()
            .unwrap()
            .push_back(Err(ExecutorError::Rejected {
                url: "http://executor/jobs".to_string(),
                status: 400,
                message: "bad command".to_string(),
            }));
    }

    pub fn set_status(&self, job_id: &str, status: JobStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(job_id.to_string(), Ok(status));
    }

    pub fn set_status_error(&self, job_id: &str) {
        self.statuses.lock().unwrap().insert(
            job_id.to_string(),
            Err(ExecutorError::Timeout {
                url: format!("http://executor/jobs/{}", job_id),
            }),
        );
    }

    pub fn submitted(&self) -> Vec<JobSpec> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn submit_calls(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl TrainingExecutor for FakeExecutor {
    async fn submit(&self, job: &JobSpec) -> Result<String, ExecutorError> {
        self.submitted.lock().unwrap().push(job.clone());
        match self.submit_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(format!("exec-{}", job.job_id)),
        }
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus, ExecutorError> {
        match self.statuses.lock().unwrap().remove(job_id) {
            Some(result) => result,
            None => Ok(JobStatus::Running),
        }
    }

    async fn delete(&self, job_id: &str) -> Result<(), ExecutorError> {
        self.deleted.lock().unwrap().push(job_id.to_string());
        Ok(())
    }
}
