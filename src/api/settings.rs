use axum::extract::State;
use axum::Json;

use crate::api::{error_response, ApiError};
use crate::config::{RetrievalConfig, RetrievalConfigUpdate};
use crate::state::AppState;

/// GET /api/settings - Current retrieval and generation settings
pub async fn get_settings(State(state): State<AppState>) -> Json<RetrievalConfig> {
    Json(state.pipeline.settings())
}

/// PUT /api/settings - Partial update; rejected as a whole if any value is out of range.
/// Requests already in flight keep the settings they started with.
pub async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<RetrievalConfigUpdate>,
) -> Result<Json<RetrievalConfig>, ApiError> {
    let settings = state
        .pipeline
        .update_settings(update)
        .map_err(error_response)?;
    Ok(Json(settings))
}
