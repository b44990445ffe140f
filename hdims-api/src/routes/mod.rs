//! Serverless function handlers
//!
//! All functions live under `/functions/v1`. Each one validates its payload
//! first, then authenticates the caller, then forwards to the platform.

pub mod analytics;
pub mod document;
pub mod health;
pub mod review;
pub mod submission;

use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;

use hdims_core::MAX_DOCUMENT_BYTES;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Room for multipart framing around the largest accepted file
const UPLOAD_BODY_LIMIT: usize = MAX_DOCUMENT_BYTES as usize + 64 * 1024;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/functions/v1/health", get(health::health_check).options(preflight))
        // Submissions
        .route(
            "/functions/v1/submit-performance-data",
            post(submission::submit_performance_data).options(preflight),
        )
        .route(
            "/functions/v1/submit-scheme-data",
            post(submission::submit_scheme_data).options(preflight),
        )
        // Review
        .route(
            "/functions/v1/review-submission",
            post(review::review_submission).options(preflight),
        )
        // Analytics
        .route(
            "/functions/v1/performance-analytics",
            post(analytics::performance_analytics).options(preflight),
        )
        .route(
            "/functions/v1/dashboard",
            get(analytics::dashboard).options(preflight),
        )
        // Documents
        .route(
            "/functions/v1/upload-document",
            post(document::upload_document)
                .options(preflight)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .with_state(state)
}

/// CORS preflight
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// JSON body, with parse failures reported in the error envelope
pub(crate) fn json_body(payload: Result<Json<Value>, JsonRejection>) -> ApiResult<Value> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {}", e.body_text())))
}
