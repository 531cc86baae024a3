//! Mock training executor HTTP server for testing
//!
//! Answers the executor's job API (`/jobs`) without a real executor running.

use serde_json::json;
use wiremock::{
    matchers::{header, method, path},
    Mock, MockServer, ResponseTemplate,
};

/// Mock executor that simulates job API responses
pub struct MockExecutorServer {
    pub server: MockServer,
    pub base_url: String,
}

impl MockExecutorServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let base_url = server.uri();
        Self { server, base_url }
    }

    /// Accept any submission and answer with `job_id`
    pub async fn mock_submit_success(&self, job_id: &str) {
        Mock::given(method("POST"))
            .and(path("/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jobId": job_id })))
            .mount(&self.server)
            .await;
    }

    /// Accept submissions only with the given bearer token
    pub async fn mock_submit_requires_token(&self, token: &str, job_id: &str) {
        Mock::given(method("POST"))
            .and(path("/jobs"))
            .and(header("Authorization", format!("Bearer {}", token).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jobId": job_id })))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Answer submissions with a bare status code
    pub async fn mock_submit_status(&self, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path("/jobs"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_job_status(&self, job_id: &str, status: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/jobs/{}", job_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": status })))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_job_status_garbage(&self, job_id: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/jobs/{}", job_id)))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&self.server)
            .await;
    }

    pub async fn mock_delete(&self, job_id: &str) {
        Mock::given(method("DELETE"))
            .and(path(format!("/jobs/{}", job_id)))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&self.server)
            .await;
    }
}
