//! Scheduled event model
//!
//! A scheduled event is a durable record of deferred work. Its `event_type`
//! selects the handler, the consistency checker and the throttle class; its
//! `data` is a JSON payload decoded according to that type (see [`payload`]).
//!
//! Status lifecycle:
//!
//! ```text
//! PENDING -> RUNNING -> COMPLETED
//!                    -> FAILED
//!                    -> PENDING (retry / postponed)
//! PENDING -> CANCELED (precondition gone, superseded, manual)
//! PENDING -> FAILED   (retry budget or staleness window exhausted)
//! ```

pub mod payload;

pub use payload::{
    CheckForImportsData, CheckTasksData, DomainTaskData, DomainTaskRequest, EventPayload,
    FuseModelData, ImportDetectedData, PrepareHierarchicalTrainingData, ResetModelData,
    RunTrainingData,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScheduledEventType {
    CheckRunningTasks,
    RunTraining,
    PrepareHierarchicalTraining,
    RunHierarchicalTraining,
    ResetModel,
    FuseModel,
    SortModel,
    RunDomainTraining,
    RetrainDomainModel,
    ClassifyDomainModel,
    EvaluateDomainModel,
    SampleDomainModel,
    GiveFeedbackDomainModel,
    CheckForImports,
    ImportDetected,
}

impl ScheduledEventType {
    pub const ALL: [ScheduledEventType; 15] = [
        ScheduledEventType::CheckRunningTasks,
        ScheduledEventType::RunTraining,
        ScheduledEventType::PrepareHierarchicalTraining,
        ScheduledEventType::RunHierarchicalTraining,
        ScheduledEventType::ResetModel,
        ScheduledEventType::FuseModel,
        ScheduledEventType::SortModel,
        ScheduledEventType::RunDomainTraining,
        ScheduledEventType::RetrainDomainModel,
        ScheduledEventType::ClassifyDomainModel,
        ScheduledEventType::EvaluateDomainModel,
        ScheduledEventType::SampleDomainModel,
        ScheduledEventType::GiveFeedbackDomainModel,
        ScheduledEventType::CheckForImports,
        ScheduledEventType::ImportDetected,
    ];

    /// Domain model jobs: the root training and the curation tasks
    pub const DOMAIN: [ScheduledEventType; 6] = [
        ScheduledEventType::RunDomainTraining,
        ScheduledEventType::RetrainDomainModel,
        ScheduledEventType::ClassifyDomainModel,
        ScheduledEventType::EvaluateDomainModel,
        ScheduledEventType::SampleDomainModel,
        ScheduledEventType::GiveFeedbackDomainModel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduledEventType::CheckRunningTasks => "check-running-tasks",
            ScheduledEventType::RunTraining => "run-training",
            ScheduledEventType::PrepareHierarchicalTraining => "prepare-hierarchical-training",
            ScheduledEventType::RunHierarchicalTraining => "run-hierarchical-training",
            ScheduledEventType::ResetModel => "reset-model",
            ScheduledEventType::FuseModel => "fuse-model",
            ScheduledEventType::SortModel => "sort-model",
            ScheduledEventType::RunDomainTraining => "run-domain-training",
            ScheduledEventType::RetrainDomainModel => "retrain-domain-model",
            ScheduledEventType::ClassifyDomainModel => "classify-domain-model",
            ScheduledEventType::EvaluateDomainModel => "evaluate-domain-model",
            ScheduledEventType::SampleDomainModel => "sample-domain-model",
            ScheduledEventType::GiveFeedbackDomainModel => "give-feedback-domain-model",
            ScheduledEventType::CheckForImports => "check-for-imports",
            ScheduledEventType::ImportDetected => "import-detected",
        }
    }

    /// Concurrency budget the event competes for, if any.
    /// Domain curation tasks run unthrottled.
    pub fn throttle_class(&self) -> Option<ThrottleClass> {
        match self {
            ScheduledEventType::RunTraining
            | ScheduledEventType::PrepareHierarchicalTraining
            | ScheduledEventType::RunHierarchicalTraining
            | ScheduledEventType::RunDomainTraining => Some(ThrottleClass::Training),
            ScheduledEventType::ResetModel
            | ScheduledEventType::FuseModel
            | ScheduledEventType::SortModel => Some(ThrottleClass::ModelTask),
            _ => None,
        }
    }

    pub fn is_domain(&self) -> bool {
        Self::DOMAIN.contains(self)
    }
}

impl fmt::Display for ScheduledEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduledEventType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScheduledEventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| StoreError::Corrupt {
                field: "event_type".to_string(),
                value: s.to_string(),
            })
    }
}

/// Concurrency budgets on the training executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleClass {
    Training,
    ModelTask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduledEventStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl ScheduledEventStatus {
    pub const ACTIVE: [ScheduledEventStatus; 2] =
        [ScheduledEventStatus::Pending, ScheduledEventStatus::Running];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduledEventStatus::Pending => "PENDING",
            ScheduledEventStatus::Running => "RUNNING",
            ScheduledEventStatus::Completed => "COMPLETED",
            ScheduledEventStatus::Failed => "FAILED",
            ScheduledEventStatus::Canceled => "CANCELED",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ScheduledEventStatus::Completed
                | ScheduledEventStatus::Failed
                | ScheduledEventStatus::Canceled
        )
    }
}

impl fmt::Display for ScheduledEventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScheduledEventStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ScheduledEventStatus::Pending),
            "RUNNING" => Ok(ScheduledEventStatus::Running),
            "COMPLETED" => Ok(ScheduledEventStatus::Completed),
            "FAILED" => Ok(ScheduledEventStatus::Failed),
            "CANCELED" => Ok(ScheduledEventStatus::Canceled),
            other => Err(StoreError::Corrupt {
                field: "status".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledEvent {
    pub id: Uuid,
    pub event_type: ScheduledEventType,
    pub key: String,
    pub key_type: String,
    pub data: String,
    pub status: ScheduledEventStatus,
    pub run_at: DateTime<Utc>,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub creator_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledEvent {
    /// Decode `data` according to `event_type`
    pub fn payload(&self) -> Result<EventPayload, crate::errors::PayloadError> {
        EventPayload::decode(self.event_type, &self.data)
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.created_at)
    }
}

/// Everything needed to publish a new event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishData {
    pub event_type: ScheduledEventType,
    pub key: String,
    pub key_type: String,
    pub data: String,
    pub run_at: DateTime<Utc>,
    pub creator_id: Uuid,
}

impl PublishData {
    /// Build from a typed payload; `event_type` follows the payload variant
    pub fn from_payload(
        payload: &EventPayload,
        key: impl Into<String>,
        key_type: impl Into<String>,
        run_at: DateTime<Utc>,
        creator_id: Uuid,
    ) -> Result<Self, crate::errors::PayloadError> {
        Ok(Self {
            event_type: payload.event_type(),
            key: key.into(),
            key_type: key_type.into(),
            data: payload.encode()?,
            run_at,
            creator_id,
        })
    }
}
