// Liveness and queue overview

use axum::{extract::State, http::StatusCode, response::Json};
use serde::Serialize;
use tracing::error;

use super::common::{api_error, ApiResponse, ApiResult};
use crate::database::EventQuery;
use crate::events::ScheduledEventStatus;
use crate::web::AppState;

#[derive(Debug, Serialize)]
pub struct HealthSummary {
    pub status: String,
    pub scheduler_enabled: bool,
    pub imports_enabled: bool,
    pub pending_events: i64,
    pub running_events: i64,
}

pub async fn get_health(State(state): State<AppState>) -> ApiResult<HealthSummary> {
    let pending = state
        .database
        .count_events(&EventQuery::new().status(ScheduledEventStatus::Pending))
        .await;
    let running = state
        .database
        .count_events(&EventQuery::new().status(ScheduledEventStatus::Running))
        .await;

    match (pending, running) {
        (Ok(pending_events), Ok(running_events)) => Ok(Json(ApiResponse::success(HealthSummary {
            status: "ok".to_string(),
            scheduler_enabled: state.config.event_scheduler.enabled,
            imports_enabled: state.config.events.check_for_imports.is_usable(),
            pending_events,
            running_events,
        }))),
        (Err(e), _) | (_, Err(e)) => {
            error!("Health check could not reach the event store: {}", e);
            Err(api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}
