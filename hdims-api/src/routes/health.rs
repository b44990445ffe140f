//! Health check endpoint

use axum::{extract::State, Json};

use crate::dto::HealthResponse;
use crate::state::AppState;

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: state.version.clone(),
        backend: state.backend.to_string(),
    })
}
