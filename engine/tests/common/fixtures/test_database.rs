//! Test database utilities for in-memory SQLite testing

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

use engine::database::{Database, TrainingTaskRequest, TrainingTaskStatus};

/// Test database wrapper around the engine's in-memory store
pub struct TestDatabase {
    database: Arc<Database>,
}

impl TestDatabase {
    /// Create a new in-memory test database with all tables
    pub async fn new() -> Result<Self> {
        Ok(Self {
            database: Arc::new(Database::in_memory().await?),
        })
    }

    pub fn database(&self) -> Arc<Database> {
        self.database.clone()
    }

    /// Get the database pool
    pub fn pool(&self) -> &SqlitePool {
        self.database.pool()
    }

    /// Move an event's `run_at` so the next tick picks it up
    pub async fn make_due(&self, id: Uuid) -> Result<()> {
        self.set_run_at(id, Utc::now() - chrono::Duration::seconds(1))
            .await
    }

    pub async fn set_run_at(&self, id: Uuid, run_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE scheduled_events SET run_at_ms = ? WHERE id = ?")
            .bind(run_at.timestamp_millis())
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Backdate an event's creation to age it
    pub async fn set_created_at(&self, id: Uuid, created_at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE scheduled_events SET created_at_ms = ? WHERE id = ?")
            .bind(created_at.timestamp_millis())
            .bind(id.to_string())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    /// Store a NEW training request
    pub async fn seed_request(&self, job_name: &str, config: &str) -> Result<TrainingTaskRequest> {
        let request = TrainingTaskRequest::new(job_name, config);
        self.database.store_training_request(&request).await?;
        Ok(request)
    }

    /// Store a request already running on the executor as `job_id`
    pub async fn seed_running_request(
        &self,
        job_name: &str,
        job_id: &str,
    ) -> Result<TrainingTaskRequest> {
        let request = self.seed_request(job_name, "/models/x/trainconfig.json").await?;
        self.database
            .mark_training_request_running(request.id, job_id)
            .await?;
        Ok(self
            .database
            .get_training_request(request.id)
            .await?
            .filter(|r| r.status == TrainingTaskStatus::Running)
            .ok_or_else(|| anyhow::anyhow!("request {} not running", request.id))?)
    }

    /// Clear all data from tables (useful between tests)
    pub async fn clear(&self) -> Result<()> {
        for table in ["scheduled_events", "training_task_requests", "corpus_imports"] {
            sqlx::query(&format!("DELETE FROM {}", table))
                .execute(self.pool())
                .await?;
        }
        Ok(())
    }
}
