//! Analytics and dashboard functions

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    Json,
};
use serde_json::{Map, Value};
use tracing::debug;
use validator::Validate;

use hdims_core::validation::{is_uuid, validate_analytics_payload};
use hdims_core::Permission;
use hdims_db::Procedure;

use super::json_body;
use crate::auth::BearerToken;
use crate::dto::{DashboardQuery, Envelope};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Performance trends over a date range
pub async fn performance_analytics(
    State(state): State<AppState>,
    token: BearerToken,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Envelope<Value>>> {
    let body = json_body(payload)?;
    let query = validate_analytics_payload(&body)?;

    let user = state.authenticate(token.require()?).await?;
    if !user.profile.can(Permission::ViewAnalytics) {
        user.require(Permission::ViewOwnSubmissions)?;
    }

    let trends = state
        .platform
        .rpc
        .rpc(&user.session.caller(), Procedure::GetPerformanceTrends, body)
        .await?;
    debug!(
        start = %query.start_date,
        end = %query.end_date,
        user_id = %user.profile.id,
        "Performance trends served"
    );
    Ok(Envelope::ok(trends, "Performance analytics retrieved"))
}

/// The caller's role dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    token: BearerToken,
    query: Result<Query<DashboardQuery>, QueryRejection>,
) -> ApiResult<Json<Envelope<Value>>> {
    let Query(query) =
        query.map_err(|e| ApiError::bad_request(format!("invalid query: {}", e.body_text())))?;
    let params = dashboard_params(&query)?;

    let user = state.authenticate(token.require()?).await?;
    let procedure = Procedure::dashboard_for(user.profile.role);

    let data = state
        .platform
        .rpc
        .rpc(&user.session.caller(), procedure, params)
        .await?;
    Ok(Envelope::ok(data, format!("{} retrieved", procedure)))
}

/// Named RPC params from the optional ids, each checked as a UUID
fn dashboard_params(query: &DashboardQuery) -> ApiResult<Value> {
    query
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let mut params = Map::new();
    for (key, value) in [
        ("facility_id", &query.facility_id),
        ("district_id", &query.district_id),
        ("state_id", &query.state_id),
    ] {
        if let Some(id) = value {
            if !is_uuid(id) {
                return Err(ApiError::bad_request(format!("{} is not a valid UUID", key)));
            }
            params.insert(key.to_string(), Value::String(id.clone()));
        }
    }
    Ok(Value::Object(params))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_params() {
        let query = DashboardQuery {
            district_id: Some("550e8400-e29b-41d4-a716-446655440000".into()),
            ..Default::default()
        };
        let params = dashboard_params(&query).unwrap();
        assert_eq!(params["district_id"], "550e8400-e29b-41d4-a716-446655440000");
        assert!(params.get("facility_id").is_none());

        let query = DashboardQuery {
            facility_id: Some("zzzzzzzz-e29b-41d4-a716-446655440000".into()),
            ..Default::default()
        };
        assert!(dashboard_params(&query).is_err());
    }
}
