// Common types and utilities for API handlers

use axum::{http::StatusCode, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::limits::MAX_LISTED_EVENTS;
use crate::database::{EventOrder, EventQuery};
use crate::errors::StoreError;
use crate::events::{ScheduledEventStatus, ScheduledEventType};

// Helper type for API responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, (StatusCode, Json<ApiResponse<()>>)>;

#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            message: Some(message),
            ..Self::success(data)
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

pub fn api_error(status: StatusCode, message: String) -> (StatusCode, Json<ApiResponse<()>>) {
    (status, Json(ApiResponse::error(message)))
}

/// Map a store failure to a status code: missing → 404, terminal → 409
pub fn store_error_response(error: anyhow::Error) -> (StatusCode, Json<ApiResponse<()>>) {
    let status = match error.downcast_ref::<StoreError>() {
        Some(StoreError::EventNotFound { .. }) => StatusCode::NOT_FOUND,
        Some(StoreError::AlreadyTerminal { .. }) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, error.to_string())
}

// Query parameters
#[derive(Debug, Default, Deserialize)]
pub struct EventFilter {
    #[serde(rename = "type")]
    pub event_type: Option<ScheduledEventType>,
    pub status: Option<ScheduledEventStatus>,
    pub key: Option<String>,
    pub key_type: Option<String>,
    pub limit: Option<i64>,
}

impl EventFilter {
    /// Newest first, capped at `MAX_LISTED_EVENTS`
    pub fn to_query(&self) -> EventQuery {
        let limit = self
            .limit
            .unwrap_or(MAX_LISTED_EVENTS)
            .clamp(1, MAX_LISTED_EVENTS);
        self.to_count_query()
            .order(EventOrder::NewestFirst)
            .limit(limit)
    }

    pub fn to_count_query(&self) -> EventQuery {
        let mut query = EventQuery::new();
        if let Some(event_type) = self.event_type {
            query = query.event_type(event_type);
        }
        if let Some(status) = self.status {
            query = query.status(status);
        }
        if let Some(key) = &self.key {
            query = query.key(key.clone());
        }
        if let Some(key_type) = &self.key_type {
            query = query.key_type(key_type.clone());
        }
        query
    }
}

/// Body of `POST /api/events`; `data` is the payload object of `type`
#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    #[serde(rename = "type")]
    pub event_type: ScheduledEventType,
    pub key: String,
    pub key_type: String,
    pub data: serde_json::Value,
    pub run_at: Option<DateTime<Utc>>,
    pub creator_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest {
    pub reason: Option<String>,
}
