// Manual dispatch

use axum::{extract::State, http::StatusCode, response::Json};
use tracing::{error, info};

use super::common::{api_error, ApiResponse, ApiResult};
use crate::dispatcher::TickReport;
use crate::web::AppState;

/// Run one dispatch tick now, independent of the scheduler interval
pub async fn run_dispatch(State(state): State<AppState>) -> ApiResult<TickReport> {
    info!("Manual dispatch tick requested");
    match state.dispatcher.tick().await {
        Ok(report) => Ok(Json(ApiResponse::success(report))),
        Err(e) => {
            error!("Manual dispatch tick failed: {}", e);
            Err(api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}
