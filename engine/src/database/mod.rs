//! Database layer for the event engine.
//!
//! This module provides SQLite persistence for:
//! - Scheduled events (the durable work queue)
//! - Training task requests (work submitted to the training executor)
//! - Corpus imports (folders already reported by the import scanner)
//!
//! The module is organized into submodules:
//! - `records` - Record types and column conversions
//! - `events` - Scheduled event store (publish, query, transitions)
//! - `training` - Training task request operations
//! - `imports` - Corpus import bookkeeping

mod events;
mod imports;
mod records;
mod training;

pub use events::{EventOrder, EventQuery, EventUpdate, SUPERSEDED};
pub use records::*;

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Sqlite, SqlitePool, Transaction};
use std::path::Path;
use tracing::{debug, error, info, warn};

use records::to_millis;

pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Expose pool for integration test queries
    #[allow(dead_code)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Transaction for writes spanning several tables
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    pub async fn new(database_path: &str) -> Result<Self> {
        info!("=== Starting database initialization ===");
        info!("Database path: {}", database_path);

        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() {
                info!("Ensuring parent directory exists: {:?}", parent);
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    error!("FAILED to create parent directory {:?}: {}", parent, e);
                    return Err(e.into());
                }
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path);
        info!("Connecting to database with URL: {}", database_url);

        let pool = match SqlitePool::connect(&database_url).await {
            Ok(pool) => {
                info!("Successfully connected to SQLite database");
                pool
            }
            Err(e) => {
                error!("FAILED to connect to database: {}", e);
                error!("   Connection URL: {}", database_url);
                return Err(e.into());
            }
        };

        let database = Self { pool };
        database.prepare().await?;

        info!("=== Database initialization completed successfully ===");
        Ok(database)
    }

    /// Private in-memory database on a single connection.
    ///
    /// Every in-memory SQLite connection is a separate database, so the pool
    /// is capped at one connection. Callers must not touch `pool()` while
    /// holding a transaction from it.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let database = Self { pool };
        database.prepare().await?;
        Ok(database)
    }

    async fn prepare(&self) -> Result<()> {
        info!("Starting table initialization...");
        if let Err(e) = self.initialize_tables().await {
            error!("CRITICAL: Database table initialization failed: {}", e);
            return Err(e);
        }

        // Events left RUNNING by a previous process never finalized
        match self.requeue_interrupted_events().await {
            Ok(0) => debug!("No interrupted events found"),
            Ok(count) => warn!("Returned {} interrupted events to PENDING on startup", count),
            Err(e) => {
                error!("Failed to requeue interrupted events: {}", e);
                warn!("Continuing with startup despite cleanup failure");
            }
        }

        self.test_database().await
    }

    async fn initialize_tables(&self) -> Result<()> {
        info!("Step 1: Creating scheduled_events table...");
        let events_table_sql = r#"
            CREATE TABLE IF NOT EXISTS scheduled_events (
                id TEXT PRIMARY KEY,
                event_type TEXT NOT NULL,
                event_key TEXT NOT NULL,
                key_type TEXT NOT NULL,
                data TEXT NOT NULL,
                status TEXT NOT NULL,
                run_at_ms INTEGER NOT NULL,
                retry_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                creator_id TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL
            )
        "#;
        if let Err(e) = sqlx::query(events_table_sql).execute(&self.pool).await {
            error!("FAILED to create scheduled_events table: {}", e);
            error!("SQL was: {}", events_table_sql);
            return Err(e.into());
        }
        info!("scheduled_events table created");

        info!("Step 2: Creating scheduled_events indexes...");
        let due_index_sql = "CREATE INDEX IF NOT EXISTS idx_events_status_run_at ON scheduled_events(status, run_at_ms, created_at_ms)";
        if let Err(e) = sqlx::query(due_index_sql).execute(&self.pool).await {
            error!("FAILED to create scheduled_events due index: {}", e);
            return Err(e.into());
        }

        // At most one active event per identity
        let identity_index_sql = r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_events_active_identity
            ON scheduled_events(event_type, event_key, key_type)
            WHERE status IN ('PENDING', 'RUNNING')
        "#;
        if let Err(e) = sqlx::query(identity_index_sql).execute(&self.pool).await {
            error!("FAILED to create scheduled_events identity index: {}", e);
            return Err(e.into());
        }
        info!("scheduled_events indexes created");

        info!("Step 3: Creating training_task_requests table...");
        let training_table_sql = r#"
            CREATE TABLE IF NOT EXISTS training_task_requests (
                id TEXT PRIMARY KEY,
                job_name TEXT NOT NULL,
                job_id TEXT NOT NULL,
                config TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL,
                started_at_ms INTEGER,
                finished_at_ms INTEGER
            )
        "#;
        if let Err(e) = sqlx::query(training_table_sql).execute(&self.pool).await {
            error!("FAILED to create training_task_requests table: {}", e);
            return Err(e.into());
        }

        let training_index_sql = "CREATE INDEX IF NOT EXISTS idx_training_status_job ON training_task_requests(status, job_name)";
        if let Err(e) = sqlx::query(training_index_sql).execute(&self.pool).await {
            error!("FAILED to create training_task_requests index: {}", e);
            return Err(e.into());
        }
        info!("training_task_requests table created");

        info!("Step 4: Creating corpus_imports table...");
        let imports_table_sql = r#"
            CREATE TABLE IF NOT EXISTS corpus_imports (
                id TEXT PRIMARY KEY,
                folder TEXT UNIQUE NOT NULL,
                path TEXT NOT NULL,
                name TEXT NOT NULL,
                status TEXT NOT NULL,
                total_size_bytes INTEGER NOT NULL,
                created_at_ms INTEGER NOT NULL,
                updated_at_ms INTEGER NOT NULL
            )
        "#;
        if let Err(e) = sqlx::query(imports_table_sql).execute(&self.pool).await {
            error!("FAILED to create corpus_imports table: {}", e);
            return Err(e.into());
        }
        info!("corpus_imports table created");

        info!("All database tables and indexes created successfully");
        Ok(())
    }

    async fn requeue_interrupted_events(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE scheduled_events
            SET status = 'PENDING',
                updated_at_ms = ?
            WHERE status = 'RUNNING'
            "#,
        )
        .bind(to_millis(Utc::now()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn test_database(&self) -> Result<()> {
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('scheduled_events', 'training_task_requests', 'corpus_imports')"
        )
        .fetch_all(&self.pool)
        .await?;

        if tables.len() != 3 {
            error!("Expected 3 tables, found {}: {:?}", tables.len(), tables);
            return Err(anyhow::anyhow!("Database tables not properly created"));
        }
        debug!("All required tables exist: {:?}", tables);
        Ok(())
    }
}
