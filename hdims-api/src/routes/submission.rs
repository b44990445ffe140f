//! Submission functions

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::Value;
use tracing::info;

use hdims_core::validation::{validate_performance_payload, validate_scheme_payload};
use hdims_core::Permission;
use hdims_db::Procedure;

use super::json_body;
use crate::auth::BearerToken;
use crate::dto::Envelope;
use crate::error::ApiResult;
use crate::state::AppState;

/// Submit facility performance data
pub async fn submit_performance_data(
    State(state): State<AppState>,
    token: BearerToken,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Envelope<Value>>> {
    let body = json_body(payload)?;
    let submission = validate_performance_payload(&body)?;

    let user = state.authenticate(token.require()?).await?;
    user.require(Permission::SubmitData)?;

    let row = state
        .platform
        .rpc
        .rpc(&user.session.caller(), Procedure::SubmitPerformanceData, body)
        .await?;
    info!(
        facility_id = %submission.facility_id,
        user_id = %user.profile.id,
        "Performance submission accepted"
    );
    Ok(Envelope::ok(row, "Performance data submitted successfully"))
}

/// Submit scheme tracking data
pub async fn submit_scheme_data(
    State(state): State<AppState>,
    token: BearerToken,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Envelope<Value>>> {
    let body = json_body(payload)?;
    let submission = validate_scheme_payload(&body)?;

    let user = state.authenticate(token.require()?).await?;
    user.require(Permission::SubmitData)?;

    let row = state
        .platform
        .rpc
        .rpc(&user.session.caller(), Procedure::SubmitSchemeData, body)
        .await?;
    info!(
        facility_id = %submission.facility_id,
        scheme = %submission.scheme_name,
        user_id = %user.profile.id,
        "Scheme submission accepted"
    );
    Ok(Envelope::ok(row, "Scheme data submitted successfully"))
}
