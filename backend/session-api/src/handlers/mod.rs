use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::error::SessionError;
use crate::metrics;
use crate::services::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "proctordash-session-api",
            "version": env!("CARGO_PKG_VERSION"),
            "sessions": state.sessions.len(),
            "questions": state.catalog.len(),
        })),
    )
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// Single place that turns the engine taxonomy into wire status codes.
pub fn error_response(e: SessionError) -> (StatusCode, String) {
    let status = match &e {
        SessionError::UnknownSession(_) | SessionError::UnknownQuestion(_) => {
            StatusCode::NOT_FOUND
        }
        SessionError::InvalidPhase { .. }
        | SessionError::AlreadySubmitted
        | SessionError::NotStarted => StatusCode::CONFLICT,
        SessionError::FullscreenRequestFailed { .. } => StatusCode::FAILED_DEPENDENCY,
        SessionError::ScoringUnavailable { .. } | SessionError::CollaboratorUnreachable { .. } => {
            StatusCode::BAD_GATEWAY
        }
        SessionError::InvalidCatalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

pub mod sessions;
pub mod sse;
