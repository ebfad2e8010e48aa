use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::{acquire, error_response, ApiError};
use crate::models::{IngestReport, IngestRequest, StatsResponse};
use crate::state::AppState;

/// POST /api/documents - Ingest files and directories, replacing the corpus
pub async fn ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestReport>, ApiError> {
    if req.paths.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "At least one path is required".to_string()));
    }

    let _permit = acquire(&state).await?;
    let report = state.pipeline.ingest(req.paths).await.map_err(error_response)?;
    Ok(Json(report))
}

/// DELETE /api/documents - Drop the index from memory and disk
pub async fn clear(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let _permit = acquire(&state).await?;
    state.pipeline.clear_index().map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/stats - Corpus and memory counters
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(state.pipeline.stats())
}
