use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::api::{acquire, error_response, ApiError};
use crate::models::{AskRequest, AskResponse, MemoryTurn};
use crate::state::AppState;

/// POST /api/ask - Answer a question from the indexed documents.
///
/// A failed generation is still a 200: the error is reported in the body
/// next to the sources that were retrieved.
pub async fn ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    let question = req.question.trim().to_string();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Question is required".to_string()));
    }

    let _permit = acquire(&state).await?;
    let answer = state.pipeline.ask(&question).await.map_err(error_response)?;

    Ok(Json(AskResponse {
        answer: answer.display_text(),
        error: answer.outcome.as_ref().err().map(ToString::to_string),
        sources: answer.source_refs(),
    }))
}

/// GET /api/history - Conversation turns, oldest first
pub async fn history(State(state): State<AppState>) -> Json<Vec<MemoryTurn>> {
    Json(state.pipeline.history())
}

/// DELETE /api/history - Forget the conversation
pub async fn clear_history(State(state): State<AppState>) -> StatusCode {
    state.pipeline.clear_memory();
    StatusCode::NO_CONTENT
}
