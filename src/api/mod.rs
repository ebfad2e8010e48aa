pub mod ask;
pub mod documents;
pub mod search;
pub mod settings;

use axum::http::StatusCode;
use tokio::sync::OwnedSemaphorePermit;

use crate::error::RagError;
use crate::state::AppState;

/// Handler error: status plus a plain-text message.
pub type ApiError = (StatusCode, String);

/// Map a pipeline error to a status code by its typed cause.
pub fn error_response(err: anyhow::Error) -> ApiError {
    let status = match err.downcast_ref::<RagError>() {
        Some(RagError::IndexNotReady) => StatusCode::CONFLICT,
        Some(RagError::InvalidConfig(_)) => StatusCode::BAD_REQUEST,
        Some(RagError::DimensionMismatch { .. }) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!("Request failed: {err:#}");
    }
    (status, format!("{err:#}"))
}

/// Wait for the single request slot.
pub async fn acquire(state: &AppState) -> Result<OwnedSemaphorePermit, ApiError> {
    state.request_gate.clone().acquire_owned().await.map_err(|_| {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "Service is shutting down".to_string(),
        )
    })
}
