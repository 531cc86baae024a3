//! Database record types (entities).
//!
//! This module contains the record structs used by the database layer besides
//! the scheduled event itself (see [`crate::events::ScheduledEvent`]), plus the
//! millisecond timestamp conversions shared by all tables.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::StoreError;

// ============================================================================
// Training task requests
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrainingTaskStatus {
    New,
    Running,
    Completed,
    Error,
}

impl TrainingTaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingTaskStatus::New => "NEW",
            TrainingTaskStatus::Running => "RUNNING",
            TrainingTaskStatus::Completed => "COMPLETED",
            TrainingTaskStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for TrainingTaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrainingTaskStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(TrainingTaskStatus::New),
            "RUNNING" => Ok(TrainingTaskStatus::Running),
            "COMPLETED" => Ok(TrainingTaskStatus::Completed),
            "ERROR" => Ok(TrainingTaskStatus::Error),
            other => Err(StoreError::Corrupt {
                field: "training_task_requests.status".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingTaskRequest {
    pub id: Uuid,
    pub job_name: String, // Executor service name
    pub job_id: String,
    pub config: String, // "parent,child" for hierarchical preparation
    pub status: TrainingTaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl TrainingTaskRequest {
    pub fn new(job_name: &str, config: &str) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            job_name: job_name.to_string(),
            job_id: id.to_string(),
            config: config.to_string(),
            status: TrainingTaskStatus::New,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }
}

// ============================================================================
// Corpus imports
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CorpusImportStatus {
    Detected,
    Registered,
    Failed,
}

impl CorpusImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorpusImportStatus::Detected => "DETECTED",
            CorpusImportStatus::Registered => "REGISTERED",
            CorpusImportStatus::Failed => "FAILED",
        }
    }
}

impl FromStr for CorpusImportStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DETECTED" => Ok(CorpusImportStatus::Detected),
            "REGISTERED" => Ok(CorpusImportStatus::Registered),
            "FAILED" => Ok(CorpusImportStatus::Failed),
            other => Err(StoreError::Corrupt {
                field: "corpus_imports.status".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusImport {
    pub id: Uuid,
    pub folder: String,
    pub path: String,
    pub name: String,
    pub status: CorpusImportStatus,
    pub total_size_bytes: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Column conversions
// ============================================================================

pub(crate) fn to_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

pub(crate) fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| anyhow!("Timestamp {} out of range", millis))
}

pub(crate) fn parse_uuid(field: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|_| {
        anyhow!(StoreError::Corrupt {
            field: field.to_string(),
            value: value.to_string(),
        })
    })
}
