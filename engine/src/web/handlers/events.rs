// Event inspection, publishing and cancellation endpoints

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::common::{
    api_error, store_error_response, ApiResponse, ApiResult, CancelRequest, EventFilter,
    PublishRequest,
};
use crate::constants::identity::SYSTEM_CREATOR;
use crate::errors::StoreError;
use crate::events::{EventPayload, PublishData, ScheduledEvent};
use crate::web::AppState;

/// List events matching the filter, newest first
pub async fn list_events(
    Query(filter): Query<EventFilter>,
    State(state): State<AppState>,
) -> ApiResult<Vec<ScheduledEvent>> {
    match state.database.query_events(&filter.to_query()).await {
        Ok(events) => Ok(Json(ApiResponse::success(events))),
        Err(e) => {
            error!("Failed to list events: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub async fn count_events(
    Query(filter): Query<EventFilter>,
    State(state): State<AppState>,
) -> ApiResult<i64> {
    match state.database.count_events(&filter.to_count_query()).await {
        Ok(count) => Ok(Json(ApiResponse::success(count))),
        Err(e) => {
            error!("Failed to count events: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub async fn get_event(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> ApiResult<ScheduledEvent> {
    match state.database.get_event(id).await {
        Ok(Some(event)) => Ok(Json(ApiResponse::success(event))),
        Ok(None) => Err(store_error_response(
            StoreError::EventNotFound { id: id.to_string() }.into(),
        )),
        Err(e) => {
            error!("Failed to get event {}: {}", id, e);
            Err(store_error_response(e))
        }
    }
}

/// Publish an event; supersedes any active event of the same identity
pub async fn publish_event(
    State(state): State<AppState>,
    Json(request): Json<PublishRequest>,
) -> ApiResult<ScheduledEvent> {
    let payload = EventPayload::decode(request.event_type, &request.data.to_string())
        .and_then(|payload| payload.validate().map(|_| payload))
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let data = PublishData::from_payload(
        &payload,
        request.key,
        request.key_type,
        request.run_at.unwrap_or_else(Utc::now),
        request.creator_id.unwrap_or(SYSTEM_CREATOR),
    )
    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    match state.database.publish_event(&data).await {
        Ok(event) => {
            info!(
                "Published {} event {} for {}/{} via API",
                event.event_type, event.id, event.key_type, event.key
            );
            Ok(Json(ApiResponse::success(event)))
        }
        Err(e) => {
            error!("Failed to publish {} event: {}", data.event_type, e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

pub async fn cancel_event(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<ScheduledEvent> {
    // Body is optional
    let request: CancelRequest = if body.is_empty() {
        CancelRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?
    };
    let reason = request
        .reason
        .unwrap_or_else(|| "canceled via API".to_string());

    match state.database.cancel_event(id, &reason).await {
        Ok(event) => Ok(Json(ApiResponse::success_with_message(
            event,
            format!("Event {} canceled", id),
        ))),
        Err(e) => {
            warn!("Failed to cancel event {}: {}", id, e);
            Err(store_error_response(e))
        }
    }
}
