use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::{acquire, error_response, ApiError};
use crate::models::{SearchRequest, SearchResponse, SourceRef};
use crate::state::AppState;

/// POST /api/search - Hybrid retrieval and optional reranking, no generation
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = req.query.trim().to_string();
    if query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Query is required".to_string()));
    }

    let _permit = acquire(&state).await?;
    let results = state
        .pipeline
        .search(&query, req.limit, req.rerank)
        .await
        .map_err(error_response)?;

    Ok(Json(SearchResponse {
        query,
        results: results.iter().map(SourceRef::from).collect(),
    }))
}
