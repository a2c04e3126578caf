//! # Event Endpoint Handlers
//!
//! Event creation, the two list strategies (offset paging and load-more) and
//! the availability pruning endpoint.

use axum::{
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, validation_error};
use crate::models::event::{EventData, EventRecord};
use crate::query::{LoadMoreEvents, LoadMoreQuery, PaginationEvents, PagingQuery};
use crate::repositories::EventRepository;
use crate::server::AppState;

/// Query parameters for pruning availability events
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[serde(rename_all = "camelCase")]
#[into_params(rename_all = "camelCase")]
pub struct DeleteBeforeTimeQuery {
    /// Events created strictly before this RFC3339 timestamp are deleted
    #[param(example = "2024-05-01T00:00:00Z")]
    pub before_time: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteResult {
    /// Number of events removed
    pub affected: u64,
}

fn validate_size(size: u64, max_page_size: u64) -> Result<(), ApiError> {
    if size < 1 || size > max_page_size {
        return Err(validation_error(
            &format!("size must be between 1 and {}", max_page_size),
            json!({ "size": size }),
        ));
    }
    Ok(())
}

/// Record a new device event
#[utoipa::path(
    post,
    path = "/events",
    request_body = EventData,
    responses(
        (status = 201, description = "Event stored and published", body = EventRecord),
        (status = 400, description = "Malformed body or eventInfo not matching category", body = ApiError, example = json!({
            "code": "VALIDATION_FAILED",
            "message": "eventInfo does not match the event category",
            "details": {"category": 2, "eventInfo": "missing field `fileName`"},
            "trace_id": "corr-12345678"
        })),
        (status = 503, description = "Database unavailable", body = ApiError)
    ),
    tag = "events"
)]
pub async fn create_event(
    State(state): State<AppState>,
    payload: Result<Json<EventData>, JsonRejection>,
) -> Result<(StatusCode, Json<EventRecord>), ApiError> {
    let Json(data) = payload?;
    let record = state.ingest.create(data).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// List events with offset pagination
#[utoipa::path(
    post,
    path = "/events/paging",
    request_body = PagingQuery,
    responses(
        (status = 200, description = "One page of events, newest first", body = PaginationEvents),
        (status = 400, description = "Invalid page, size or timestamp", body = ApiError),
        (status = 503, description = "Database unavailable", body = ApiError)
    ),
    tag = "events"
)]
pub async fn find_all_paging(
    State(state): State<AppState>,
    payload: Result<Json<PagingQuery>, JsonRejection>,
) -> Result<Json<PaginationEvents>, ApiError> {
    let Json(query) = payload?;

    if query.page < 1 {
        return Err(validation_error(
            "page must be at least 1",
            json!({ "page": query.page }),
        ));
    }
    validate_size(query.size, state.config.max_page_size)?;
    if query.checked_offset().is_none() {
        return Err(validation_error(
            "page is out of range",
            json!({ "page": query.page, "size": query.size }),
        ));
    }

    let page = EventRepository::new(&state.db)
        .find_all_paging(&query)
        .await
        .map_err(|e| {
            tracing::error!("Failed to page events: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(page))
}

/// List events with cursor ("load more") pagination
#[utoipa::path(
    post,
    path = "/events/load-more",
    request_body = LoadMoreQuery,
    responses(
        (status = 200, description = "Events strictly older than the cursor, newest first", body = LoadMoreEvents),
        (status = 400, description = "Invalid size or timestamp", body = ApiError),
        (status = 503, description = "Database unavailable", body = ApiError)
    ),
    tag = "events"
)]
pub async fn find_all_load_more(
    State(state): State<AppState>,
    payload: Result<Json<LoadMoreQuery>, JsonRejection>,
) -> Result<Json<LoadMoreEvents>, ApiError> {
    let Json(query) = payload?;
    validate_size(query.size, state.config.max_page_size)?;

    let page = EventRepository::new(&state.db)
        .find_all_load_more(&query)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load more events: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(page))
}

/// Delete availability events created before a point in time
#[utoipa::path(
    delete,
    path = "/events/availability",
    params(DeleteBeforeTimeQuery),
    responses(
        (status = 200, description = "Number of availability events deleted", body = DeleteResult),
        (status = 400, description = "beforeTime missing or not RFC3339", body = ApiError, example = json!({
            "code": "VALIDATION_FAILED",
            "message": "beforeTime must be a valid RFC3339 timestamp",
            "trace_id": "corr-12345678"
        }))
    ),
    tag = "events"
)]
pub async fn delete_availability_before(
    State(state): State<AppState>,
    query: Result<Query<DeleteBeforeTimeQuery>, QueryRejection>,
) -> Result<Json<DeleteResult>, ApiError> {
    let Query(query) = query?;

    let cutoff = DateTime::parse_from_rfc3339(query.before_time.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
                "beforeTime must be a valid RFC3339 timestamp",
            )
        })?;

    let affected = state.ingest.delete_before_time(cutoff).await?;

    Ok(Json(DeleteResult { affected }))
}
