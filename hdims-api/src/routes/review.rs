//! Review function

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::Value;
use tracing::info;

use hdims_core::validation::validate_review_payload;
use hdims_core::Permission;
use hdims_db::Procedure;

use super::json_body;
use crate::auth::BearerToken;
use crate::dto::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;

/// Approve, reject, send back or take up a submission
pub async fn review_submission(
    State(state): State<AppState>,
    token: BearerToken,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Envelope<Value>>> {
    let body = json_body(payload)?;
    let request = validate_review_payload(&body)?;

    let user = state.authenticate(token.require()?).await?;
    user.require(Permission::ReviewSubmissions)?;

    let result = state
        .platform
        .rpc
        .rpc(&user.session.caller(), Procedure::ReviewSubmission, body)
        .await?;
    info!(
        submission_id = %request.entity_id,
        entity_type = %request.entity_type,
        new_status = request.new_status.as_str(),
        reviewer_id = %user.profile.id,
        "Review applied"
    );
    Ok(Envelope::ok(
        result,
        format!("Submission status set to {}", request.new_status),
    ))
}
