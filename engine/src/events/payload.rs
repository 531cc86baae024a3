//! Typed event payloads.
//!
//! The `data` column holds the JSON of one of the structs below; which one is
//! determined by the event type, never by the JSON itself.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

use super::ScheduledEventType;
use crate::errors::PayloadError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckTasksData {
    #[serde(default)]
    pub previous_checking_event: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunTrainingData {
    pub training_task_request_id: Uuid,
    #[serde(default)]
    pub corpus_id: Option<String>,
    #[serde(default)]
    pub parameters: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareHierarchicalTrainingData {
    pub training_task_request_id: Uuid,
    pub parent_model: String,
    pub child_model: String,
    pub topic_id: u32,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetModelData {
    pub request_id: Uuid,
    pub model_name: String,
}

/// What the user asked of a domain model; parameters are prefixed by the
/// component they configure (`DC.`, `classifier.`, `AL.`, `evaluator.`, `sampler.`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainTaskRequest {
    pub name: String,
    #[serde(default)]
    pub corpus: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub keywords: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// Shared by the domain training and every domain curation event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainTaskData {
    pub training_task_request_id: Uuid,
    pub request: DomainTaskRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuseModelData {
    pub request_id: Uuid,
    pub model_name: String,
    pub topics: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckForImportsData {
    #[serde(default, rename = "fileSizeThresholdInMB")]
    pub file_size_threshold_in_mb: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportDetectedData {
    pub import_id: Uuid,
    pub folder: String,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub records: Option<u64>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub arguments: BTreeMap<String, String>,
    pub total_size_bytes: u64,
    pub files: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    CheckRunningTasks(CheckTasksData),
    RunTraining(RunTrainingData),
    PrepareHierarchicalTraining(PrepareHierarchicalTrainingData),
    RunHierarchicalTraining(RunTrainingData),
    ResetModel(ResetModelData),
    FuseModel(FuseModelData),
    SortModel(ResetModelData),
    /// Any of the domain event types; the type travels with the data
    Domain(ScheduledEventType, DomainTaskData),
    CheckForImports(CheckForImportsData),
    ImportDetected(ImportDetectedData),
}

impl EventPayload {
    pub fn event_type(&self) -> ScheduledEventType {
        match self {
            EventPayload::CheckRunningTasks(_) => ScheduledEventType::CheckRunningTasks,
            EventPayload::RunTraining(_) => ScheduledEventType::RunTraining,
            EventPayload::PrepareHierarchicalTraining(_) => {
                ScheduledEventType::PrepareHierarchicalTraining
            }
            EventPayload::RunHierarchicalTraining(_) => ScheduledEventType::RunHierarchicalTraining,
            EventPayload::ResetModel(_) => ScheduledEventType::ResetModel,
            EventPayload::FuseModel(_) => ScheduledEventType::FuseModel,
            EventPayload::SortModel(_) => ScheduledEventType::SortModel,
            EventPayload::Domain(event_type, _) => *event_type,
            EventPayload::CheckForImports(_) => ScheduledEventType::CheckForImports,
            EventPayload::ImportDetected(_) => ScheduledEventType::ImportDetected,
        }
    }

    pub fn decode(event_type: ScheduledEventType, data: &str) -> Result<Self, PayloadError> {
        // Housekeeping events were historically published with an empty body
        let data = if data.trim().is_empty() { "{}" } else { data };
        let err = |e: serde_json::Error| PayloadError::Decode {
            event_type: event_type.to_string(),
            reason: e.to_string(),
        };

        let payload = match event_type {
            ScheduledEventType::CheckRunningTasks => {
                EventPayload::CheckRunningTasks(serde_json::from_str(data).map_err(err)?)
            }
            ScheduledEventType::RunTraining => {
                EventPayload::RunTraining(serde_json::from_str(data).map_err(err)?)
            }
            ScheduledEventType::PrepareHierarchicalTraining => {
                EventPayload::PrepareHierarchicalTraining(serde_json::from_str(data).map_err(err)?)
            }
            ScheduledEventType::RunHierarchicalTraining => {
                EventPayload::RunHierarchicalTraining(serde_json::from_str(data).map_err(err)?)
            }
            ScheduledEventType::ResetModel => {
                EventPayload::ResetModel(serde_json::from_str(data).map_err(err)?)
            }
            ScheduledEventType::FuseModel => {
                EventPayload::FuseModel(serde_json::from_str(data).map_err(err)?)
            }
            ScheduledEventType::SortModel => {
                EventPayload::SortModel(serde_json::from_str(data).map_err(err)?)
            }
            ScheduledEventType::RunDomainTraining
            | ScheduledEventType::RetrainDomainModel
            | ScheduledEventType::ClassifyDomainModel
            | ScheduledEventType::EvaluateDomainModel
            | ScheduledEventType::SampleDomainModel
            | ScheduledEventType::GiveFeedbackDomainModel => {
                EventPayload::Domain(event_type, serde_json::from_str(data).map_err(err)?)
            }
            ScheduledEventType::CheckForImports => {
                EventPayload::CheckForImports(serde_json::from_str(data).map_err(err)?)
            }
            ScheduledEventType::ImportDetected => {
                EventPayload::ImportDetected(serde_json::from_str(data).map_err(err)?)
            }
        };
        Ok(payload)
    }

    pub fn encode(&self) -> Result<String, PayloadError> {
        let encoded = match self {
            EventPayload::CheckRunningTasks(d) => serde_json::to_string(d),
            EventPayload::RunTraining(d) | EventPayload::RunHierarchicalTraining(d) => {
                serde_json::to_string(d)
            }
            EventPayload::PrepareHierarchicalTraining(d) => serde_json::to_string(d),
            EventPayload::ResetModel(d) | EventPayload::SortModel(d) => serde_json::to_string(d),
            EventPayload::FuseModel(d) => serde_json::to_string(d),
            EventPayload::Domain(_, d) => serde_json::to_string(d),
            EventPayload::CheckForImports(d) => serde_json::to_string(d),
            EventPayload::ImportDetected(d) => serde_json::to_string(d),
        };
        encoded.map_err(|e| PayloadError::Decode {
            event_type: self.event_type().to_string(),
            reason: e.to_string(),
        })
    }

    /// Training task request the event acts on, if any
    pub fn request_id(&self) -> Option<Uuid> {
        match self {
            EventPayload::RunTraining(d) | EventPayload::RunHierarchicalTraining(d) => {
                Some(d.training_task_request_id)
            }
            EventPayload::PrepareHierarchicalTraining(d) => Some(d.training_task_request_id),
            EventPayload::ResetModel(d) | EventPayload::SortModel(d) => Some(d.request_id),
            EventPayload::FuseModel(d) => Some(d.request_id),
            EventPayload::Domain(_, d) => Some(d.training_task_request_id),
            _ => None,
        }
    }

    /// Semantic checks that serde cannot express
    pub fn validate(&self) -> Result<(), PayloadError> {
        let invalid = |reason: &str| PayloadError::Invalid {
            event_type: self.event_type().to_string(),
            reason: reason.to_string(),
        };

        match self {
            EventPayload::ResetModel(d) | EventPayload::SortModel(d) => {
                if d.model_name.trim().is_empty() {
                    return Err(invalid("model name is empty"));
                }
            }
            EventPayload::Domain(event_type, d) => {
                if d.request.name.trim().is_empty() {
                    return Err(invalid("domain model name is empty"));
                }
                let task = d.request.task.as_deref().unwrap_or("").trim();
                if *event_type == ScheduledEventType::RunDomainTraining && task.is_empty() {
                    return Err(invalid("training task is missing"));
                }
            }
            EventPayload::FuseModel(d) => {
                if d.model_name.trim().is_empty() {
                    return Err(invalid("model name is empty"));
                }
                let distinct: BTreeSet<u32> = d.topics.iter().copied().collect();
                if distinct.len() < 2 {
                    return Err(invalid("at least two distinct topics are required"));
                }
            }
            EventPayload::PrepareHierarchicalTraining(d) => {
                if d.parent_model.trim().is_empty() || d.child_model.trim().is_empty() {
                    return Err(invalid("parent and child model names are required"));
                }
                if d.parent_model == d.child_model {
                    return Err(invalid("child model must differ from its parent"));
                }
            }
            EventPayload::ImportDetected(d) => {
                if d.folder.trim().is_empty() {
                    return Err(invalid("folder is empty"));
                }
            }
            _ => {}
        }
        Ok(())
    }
}
