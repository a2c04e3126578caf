//! # Device Endpoint Handlers

use axum::{extract::State, response::Json};

use crate::error::ApiError;
use crate::models::hierarchy::DeviceHierarchy;
use crate::repositories::DeviceRepository;
use crate::server::AppState;

/// Nested edge → RSU → OBU relationship with current telemetry
#[utoipa::path(
    get,
    path = "/devices/relationship",
    responses(
        (status = 200, description = "Device hierarchy", body = DeviceHierarchy),
        (status = 503, description = "Database unavailable", body = ApiError)
    ),
    tag = "devices"
)]
pub async fn relationship(
    State(state): State<AppState>,
) -> Result<Json<DeviceHierarchy>, ApiError> {
    let hierarchy = DeviceRepository::new(&state.db)
        .load_hierarchy()
        .await
        .map_err(|e| {
            tracing::error!("Failed to load device hierarchy: {}", e);
            ApiError::from(e)
        })?;

    Ok(Json(hierarchy))
}
