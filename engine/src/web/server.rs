use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::web::{handlers, AppState};

pub async fn start_web_server(state: AppState) -> Result<()> {
    let app = create_router(state.clone());
    let addr = format!("{}:{}", state.config.host, state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Admin API running on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::get_health))
        // === EVENT ROUTES ===
        .route(
            "/api/events",
            get(handlers::list_events).post(handlers::publish_event),
        )
        .route("/api/events/count", get(handlers::count_events))
        .route("/api/events/{id}", get(handlers::get_event))
        .route("/api/events/{id}/cancel", post(handlers::cancel_event))
        // === DISPATCH ROUTES ===
        .route("/api/dispatch/run", post(handlers::run_dispatch))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
