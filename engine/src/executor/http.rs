// File: engine/src/executor/http.rs
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{JobSpec, JobStatus, TrainingExecutor};
use crate::config::ExecutorConfig;
use crate::constants::http::CONNECT_TIMEOUT;
use crate::errors::ExecutorError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
}

pub struct HttpTrainingExecutor {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpTrainingExecutor {
    pub fn new(config: &ExecutorConfig) -> Result<Self, ExecutorError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ExecutorError::ConnectionFailed {
                url: config.base_url.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn jobs_url(&self) -> String {
        format!("{}/jobs", self.base_url)
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/jobs/{}", self.base_url, job_id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {}", key)),
            None => request,
        }
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<Response, ExecutorError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| map_transport_error(url, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Executor unavailable at {}: {}", url, status);
            return Err(ExecutorError::Unavailable {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let message = response.text().await.unwrap_or_default();
        Err(ExecutorError::Rejected {
            url: url.to_string(),
            status: status.as_u16(),
            message,
        })
    }
}

fn map_transport_error(url: &str, error: reqwest::Error) -> ExecutorError {
    if error.is_timeout() {
        ExecutorError::Timeout {
            url: url.to_string(),
        }
    } else {
        ExecutorError::ConnectionFailed {
            url: url.to_string(),
            reason: error.to_string(),
        }
    }
}

#[async_trait]
impl TrainingExecutor for HttpTrainingExecutor {
    async fn submit(&self, job: &JobSpec) -> Result<String, ExecutorError> {
        let url = self.jobs_url();
        info!("Submitting {} job {} to executor", job.job_name, job.job_id);

        let response = self.send(&url, self.client.post(&url).json(job)).await?;
        let body: SubmitResponse =
            response
                .json()
                .await
                .map_err(|e| ExecutorError::InvalidResponse {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;

        info!("Executor accepted job {} as {}", job.job_id, body.job_id);
        Ok(body.job_id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus, ExecutorError> {
        let url = self.job_url(job_id);
        let response = self.send(&url, self.client.get(&url)).await?;
        let body: StatusResponse =
            response
                .json()
                .await
                .map_err(|e| ExecutorError::InvalidResponse {
                    url: url.clone(),
                    reason: e.to_string(),
                })?;

        debug!("Executor job {} status: {}", job_id, body.status);
        Ok(JobStatus::parse(&body.status))
    }

    async fn delete(&self, job_id: &str) -> Result<(), ExecutorError> {
        let url = self.job_url(job_id);
        self.send(&url, self.client.delete(&url)).await?;
        debug!("Executor job {} deleted", job_id);
        Ok(())
    }
}
