//! Integration tests for the HTTP training executor client against wiremock

mod common;

use common::fixtures::*;

use engine::config::ExecutorConfig;
use engine::errors::ExecutorError;
use engine::executor::{HttpTrainingExecutor, JobSpec, JobStatus, TrainingExecutor};

fn executor(base_url: &str, api_key: Option<&str>) -> HttpTrainingExecutor {
    HttpTrainingExecutor::new(&ExecutorConfig {
        base_url: format!("{}/", base_url),
        request_timeout_seconds: 5,
        api_key: api_key.map(str::to_string),
    })
    .unwrap()
}

fn job() -> JobSpec {
    JobSpec::new(
        jobs::TRAIN_TOPIC_MODELS,
        "req-1",
        "topicmodeling.py --train --config /m/trainconfig.json".to_string(),
    )
}

#[tokio::test]
async fn test_submit_returns_executor_job_id() {
    let mock = MockExecutorServer::start().await;
    mock.mock_submit_success("exec-42").await;

    let job_id = executor(&mock.base_url, None).submit(&job()).await.unwrap();
    assert_eq!(job_id, "exec-42");
}

#[tokio::test]
async fn test_submit_sends_bearer_token() {
    let mock = MockExecutorServer::start().await;
    mock.mock_submit_requires_token("secret", "exec-7").await;

    let job_id = executor(&mock.base_url, Some("secret"))
        .submit(&job())
        .await
        .unwrap();
    assert_eq!(job_id, "exec-7");
}

#[tokio::test]
async fn test_server_errors_are_transient() {
    let mock = MockExecutorServer::start().await;
    mock.mock_submit_status(503, "busy").await;

    let err = executor(&mock.base_url, None).submit(&job()).await.unwrap_err();
    assert!(matches!(err, ExecutorError::Unavailable { status: 503, .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_rate_limit_is_transient() {
    let mock = MockExecutorServer::start().await;
    mock.mock_submit_status(429, "slow down").await;

    let err = executor(&mock.base_url, None).submit(&job()).await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_client_errors_are_rejections() {
    let mock = MockExecutorServer::start().await;
    mock.mock_submit_status(422, "unknown image").await;

    let err = executor(&mock.base_url, None).submit(&job()).await.unwrap_err();
    match &err {
        ExecutorError::Rejected {
            status, message, ..
        } => {
            assert_eq!(*status, 422);
            assert_eq!(message, "unknown image");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(!err.is_transient());
}

#[tokio::test]
async fn test_unreachable_executor_is_transient() {
    // Nothing listens on the discard port
    let err = executor("http://127.0.0.1:9", None)
        .submit(&job())
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::ConnectionFailed { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_status_and_delete() {
    let mock = MockExecutorServer::start().await;
    mock.mock_job_status("exec-1", "FINISHED").await;
    mock.mock_job_status("exec-2", "killed").await;
    mock.mock_delete("exec-1").await;
    let executor = executor(&mock.base_url, None);

    assert_eq!(executor.status("exec-1").await.unwrap(), JobStatus::Finished);
    assert!(executor.status("exec-2").await.unwrap().is_failure());
    executor.delete("exec-1").await.unwrap();
}

#[tokio::test]
async fn test_garbage_status_body_is_invalid_response() {
    let mock = MockExecutorServer::start().await;
    mock.mock_job_status_garbage("exec-3").await;

    let err = executor(&mock.base_url, None)
        .status("exec-3")
        .await
        .unwrap_err();
    assert!(matches!(err, ExecutorError::InvalidResponse { .. }));
}
