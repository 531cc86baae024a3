//! Training task request operations.

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, error};
use uuid::Uuid;

use super::records::{from_millis, parse_uuid, to_millis, TrainingTaskRequest, TrainingTaskStatus};
use super::Database;

fn request_from_row(row: &SqliteRow) -> Result<TrainingTaskRequest> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let started_at: Option<i64> = row.try_get("started_at_ms")?;
    let finished_at: Option<i64> = row.try_get("finished_at_ms")?;

    Ok(TrainingTaskRequest {
        id: parse_uuid("training_task_requests.id", &id)?,
        job_name: row.try_get("job_name")?,
        job_id: row.try_get("job_id")?,
        config: row.try_get("config")?,
        status: status.parse()?,
        created_at: from_millis(row.try_get("created_at_ms")?)?,
        started_at: started_at.map(from_millis).transpose()?,
        finished_at: finished_at.map(from_millis).transpose()?,
    })
}

impl Database {
    pub async fn store_training_request(&self, request: &TrainingTaskRequest) -> Result<()> {
        debug!("Storing training request: {}", request.id);

        match sqlx::query(
            r#"
            INSERT OR REPLACE INTO training_task_requests (
                id, job_name, job_id, config, status,
                created_at_ms, started_at_ms, finished_at_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(request.id.to_string())
        .bind(&request.job_name)
        .bind(&request.job_id)
        .bind(&request.config)
        .bind(request.status.as_str())
        .bind(to_millis(request.created_at))
        .bind(request.started_at.map(to_millis))
        .bind(request.finished_at.map(to_millis))
        .execute(&self.pool)
        .await
        {
            Ok(_) => Ok(()),
            Err(e) => {
                error!("Failed to store training request {}: {}", request.id, e);
                Err(e.into())
            }
        }
    }

    pub async fn get_training_request(&self, id: Uuid) -> Result<Option<TrainingTaskRequest>> {
        let row = sqlx::query(
            r#"
            SELECT id, job_name, job_id, config, status,
                   created_at_ms, started_at_ms, finished_at_ms
            FROM training_task_requests
            WHERE id = ?
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(request_from_row).transpose()
    }

    pub async fn get_training_requests_by_status(
        &self,
        status: TrainingTaskStatus,
    ) -> Result<Vec<TrainingTaskRequest>> {
        let rows = sqlx::query(
            r#"
            SELECT id, job_name, job_id, config, status,
                   created_at_ms, started_at_ms, finished_at_ms
            FROM training_task_requests
            WHERE status = ?
            ORDER BY created_at_ms ASC
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(request_from_row).collect()
    }

    /// RUNNING requests whose job belongs to `job_names`
    pub async fn count_running_requests(&self, job_names: &[&str]) -> Result<i64> {
        if job_names.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) FROM training_task_requests WHERE status = 'RUNNING' AND job_name IN (",
        );
        let mut list = builder.separated(", ");
        for job_name in job_names {
            list.push_bind(job_name.to_string());
        }
        list.push_unseparated(")");

        let count: i64 = builder.build_query_scalar().fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Guarded `NEW -> RUNNING` once the executor accepted the job
    pub async fn mark_training_request_running(&self, id: Uuid, job_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE training_task_requests
            SET status = 'RUNNING', job_id = ?, started_at_ms = ?
            WHERE id = ? AND status = 'NEW'
            "#,
        )
        .bind(job_id)
        .bind(to_millis(Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Guarded `RUNNING -> COMPLETED | ERROR`
    pub async fn finish_training_request(
        &self,
        id: Uuid,
        status: TrainingTaskStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE training_task_requests
            SET status = ?, finished_at_ms = ?
            WHERE id = ? AND status = 'RUNNING'
            "#,
        )
        .bind(status.as_str())
        .bind(to_millis(Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
