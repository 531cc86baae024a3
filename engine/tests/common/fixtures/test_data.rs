//! Common test data and event builders

use chrono::{DateTime, Utc};
use parquet::data_type::{ByteArray, ByteArrayType, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;
use std::sync::Arc;
use uuid::Uuid;

use engine::constants::identity::{SYSTEM_CREATOR, TRAINING_REQUEST_KEY_TYPE};
use engine::events::{
    CheckForImportsData, DomainTaskData, DomainTaskRequest, EventPayload, FuseModelData,
    PrepareHierarchicalTrainingData, PublishData, ResetModelData, RunTrainingData,
    ScheduledEventType,
};

/// Common job names
pub mod jobs {
    pub use engine::constants::jobs::{MANAGE_MODELS, TRAIN_DOMAIN_MODELS, TRAIN_TOPIC_MODELS};
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Publish data keyed by the training request it acts on
pub fn request_event(payload: EventPayload, request_id: Uuid) -> PublishData {
    PublishData::from_payload(
        &payload,
        request_id.to_string(),
        TRAINING_REQUEST_KEY_TYPE,
        Utc::now(),
        Uuid::new_v4(),
    )
    .expect("payload must encode")
}

pub fn run_training(request_id: Uuid) -> PublishData {
    request_event(
        EventPayload::RunTraining(RunTrainingData {
            training_task_request_id: request_id,
            corpus_id: Some("corpus-1".to_string()),
            parameters: None,
        }),
        request_id,
    )
}

pub fn prepare_hierarchical(request_id: Uuid, parent: &str, child: &str) -> PublishData {
    request_event(
        EventPayload::PrepareHierarchicalTraining(PrepareHierarchicalTrainingData {
            training_task_request_id: request_id,
            parent_model: parent.to_string(),
            child_model: child.to_string(),
            topic_id: 3,
            user_id: Uuid::new_v4(),
        }),
        request_id,
    )
}

pub fn reset_model(request_id: Uuid, model_name: &str) -> PublishData {
    request_event(
        EventPayload::ResetModel(ResetModelData {
            request_id,
            model_name: model_name.to_string(),
        }),
        request_id,
    )
}

pub fn sort_model(request_id: Uuid, model_name: &str) -> PublishData {
    request_event(
        EventPayload::SortModel(ResetModelData {
            request_id,
            model_name: model_name.to_string(),
        }),
        request_id,
    )
}

pub fn domain_task(
    event_type: ScheduledEventType,
    request_id: Uuid,
    request: DomainTaskRequest,
) -> PublishData {
    request_event(
        EventPayload::Domain(
            event_type,
            DomainTaskData {
                training_task_request_id: request_id,
                request,
            },
        ),
        request_id,
    )
}

pub fn fuse_model(request_id: Uuid, model_name: &str, topics: Vec<u32>) -> PublishData {
    request_event(
        EventPayload::FuseModel(FuseModelData {
            request_id,
            model_name: model_name.to_string(),
            topics,
        }),
        request_id,
    )
}

pub fn check_for_imports(threshold_mb: Option<u64>) -> PublishData {
    PublishData::from_payload(
        &EventPayload::CheckForImports(CheckForImportsData {
            file_size_threshold_in_mb: threshold_mb,
        }),
        "imports",
        "housekeeping",
        Utc::now(),
        SYSTEM_CREATOR,
    )
    .expect("payload must encode")
}

/// Bytes of `mb` configured megabytes
pub fn megabytes(mb: u64) -> u64 {
    mb * 1_000_000
}

/// Uncompressed parquet file with an `id` and a `text` column, one row per text
pub fn parquet_corpus(texts: &[&str]) -> Vec<u8> {
    let schema = parse_message_type(
        "message corpus { required int64 id; required binary text (UTF8); }",
    )
    .expect("schema must parse");
    let properties = Arc::new(WriterProperties::builder().build());
    let mut writer = SerializedFileWriter::new(Vec::new(), Arc::new(schema), properties)
        .expect("writer must open");

    let ids: Vec<i64> = (1..=texts.len() as i64).collect();
    let values: Vec<ByteArray> = texts.iter().map(|t| ByteArray::from(*t)).collect();

    let mut row_group = writer.next_row_group().expect("row group");
    let mut column = row_group.next_column().expect("id column").expect("id column");
    column
        .typed::<Int64Type>()
        .write_batch(&ids, None, None)
        .expect("ids written");
    column.close().expect("id column closed");
    let mut column = row_group.next_column().expect("text column").expect("text column");
    column
        .typed::<ByteArrayType>()
        .write_batch(&values, None, None)
        .expect("texts written");
    column.close().expect("text column closed");
    row_group.close().expect("row group closed");

    writer.into_inner().expect("footer written")
}
