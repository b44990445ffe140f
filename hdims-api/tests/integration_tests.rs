//! Integration tests for the HDIMS functions
//!
//! Each test runs the router against the in-memory platform.

use axum::http::{header::AUTHORIZATION, HeaderValue, Method, StatusCode};
use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestRequest, TestServer};
use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use hdims_api::{create_router, AppState};
use hdims_core::{Collection, Role, MAX_DOCUMENT_BYTES};
use hdims_db::{
    AuthProvider, Backend, DataStore, DbError, DbResult, MemoryPlatform, NewUser, Platform, Query,
    Selection,
};

struct TestEnv {
    server: TestServer,
    platform: MemoryPlatform,
    facility_id: Uuid,
    other_facility_id: Uuid,
    hospital_token: String,
    reviewer_token: String,
}

async fn sign_in(platform: &MemoryPlatform, user: NewUser) -> String {
    let (email, password) = (user.email.clone(), user.password.clone());
    platform.create_user(user).await.unwrap();
    platform
        .auth
        .sign_in_with_password(&email, &password)
        .await
        .unwrap()
        .access_token
}

/// Create test server with one district, two facilities and two users
async fn create_test_env() -> TestEnv {
    let platform = MemoryPlatform::new();
    let (state_id, district_id, facility_id) = platform
        .seed_location("Maharashtra", "Pune", "PHC Hadapsar")
        .await
        .unwrap();
    let (_, _, other_facility_id) = platform
        .seed_location("Kerala", "Kollam", "CHC Karunagappally")
        .await
        .unwrap();

    let hospital_token = sign_in(
        &platform,
        NewUser::new("phc@example.org", "secret123", Role::HospitalUser).facility(facility_id),
    )
    .await;
    let reviewer_token = sign_in(
        &platform,
        NewUser::new("dho@example.org", "secret123", Role::DistrictAdmin)
            .district(district_id)
            .state(state_id),
    )
    .await;

    let state = AppState::new(platform.platform(), Backend::Memory);
    let server = TestServer::new(create_router(state)).unwrap();
    TestEnv {
        server,
        platform,
        facility_id,
        other_facility_id,
        hospital_token,
        reviewer_token,
    }
}

fn bearer(request: TestRequest, token: &str) -> TestRequest {
    request.add_header(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    )
}

fn performance(facility_id: Uuid) -> Value {
    json!({
        "facility_id": facility_id,
        "program": "Immunization",
        "reporting_start": "2024-01-01",
        "reporting_end": "2024-01-31",
        "metrics": [{ "metric_type": "bcg_doses", "metric_value": 120 }],
    })
}

async fn submit(env: &TestEnv) -> String {
    let response = bearer(
        env.server.post("/functions/v1/submit-performance-data"),
        &env.hospital_token,
    )
    .json(&performance(env.facility_id))
    .await;
    response.assert_status_ok();
    let body: Value = response.json();
    body["data"]["id"].as_str().unwrap().to_string()
}

async fn review(env: &TestEnv, body: Value) -> axum_test::TestResponse {
    bearer(
        env.server.post("/functions/v1/review-submission"),
        &env.reviewer_token,
    )
    .json(&body)
    .await
}

// ============ Health ============

#[tokio::test]
async fn test_health_check() {
    let env = create_test_env().await;

    let response = env.server.get("/functions/v1/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "memory");
}

#[tokio::test]
async fn test_options_preflight() {
    let env = create_test_env().await;

    for path in [
        "/functions/v1/submit-performance-data",
        "/functions/v1/review-submission",
        "/functions/v1/upload-document",
    ] {
        let response = env.server.method(Method::OPTIONS, path).await;
        response.assert_status_ok();
    }
}

// ============ Submissions ============

#[tokio::test]
async fn test_submit_performance_data() {
    let env = create_test_env().await;

    let response = bearer(
        env.server.post("/functions/v1/submit-performance-data"),
        &env.hospital_token,
    )
    .json(&performance(env.facility_id))
    .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "pending");
    assert!(body["timestamp"].is_string());
    assert_eq!(env.platform.store.len(Collection::PerformanceData).await, 1);
}

#[tokio::test]
async fn test_missing_fields_rejected_before_auth() {
    let env = create_test_env().await;

    // no bearer token: validation must fail first
    let response = env
        .server
        .post("/functions/v1/submit-performance-data")
        .json(&json!({ "facility_id": env.facility_id }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    let error = body["error"].as_str().unwrap();
    assert!(error.contains("program"));
    assert!(error.contains("metrics"));
}

#[tokio::test]
async fn test_negative_metric_rejected() {
    let env = create_test_env().await;
    let mut payload = performance(env.facility_id);
    payload["metrics"][0]["metric_value"] = json!(-5);

    let response = bearer(
        env.server.post("/functions/v1/submit-performance-data"),
        &env.hospital_token,
    )
    .json(&payload)
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(env.platform.store.len(Collection::PerformanceData).await, 0);
}

#[tokio::test]
async fn test_malformed_facility_id_rejected() {
    let env = create_test_env().await;
    let mut payload = performance(env.facility_id);
    payload["facility_id"] = json!("not-a-uuid");

    let response = bearer(
        env.server.post("/functions/v1/submit-performance-data"),
        &env.hospital_token,
    )
    .json(&payload)
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("facility_id"));
}

#[tokio::test]
async fn test_invalid_json_body() {
    let env = create_test_env().await;

    let response = bearer(
        env.server.post("/functions/v1/submit-performance-data"),
        &env.hospital_token,
    )
    .text("{not json")
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_missing_token_is_forbidden() {
    let env = create_test_env().await;

    let response = env
        .server
        .post("/functions/v1/submit-performance-data")
        .json(&performance(env.facility_id))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("Unauthorized"));
}

#[tokio::test]
async fn test_submit_for_other_facility_forbidden() {
    let env = create_test_env().await;

    let response = bearer(
        env.server.post("/functions/v1/submit-performance-data"),
        &env.hospital_token,
    )
    .json(&performance(env.other_facility_id))
    .await;

    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(env.platform.store.len(Collection::PerformanceData).await, 0);
}

#[tokio::test]
async fn test_submit_scheme_data() {
    let env = create_test_env().await;

    let response = bearer(
        env.server.post("/functions/v1/submit-scheme-data"),
        &env.hospital_token,
    )
    .json(&json!({
        "facility_id": env.facility_id,
        "scheme_name": "Janani Suraksha Yojana",
        "beneficiary_count": 42,
        "funds_allocated": 50000,
        "funds_utilized": 12500.5,
        "activities": ["ANC camps", "Cash transfer"],
    }))
    .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["scheme_name"], "Janani Suraksha Yojana");
    assert_eq!(env.platform.store.len(Collection::SchemeTracking).await, 1);
}

#[tokio::test]
async fn test_reviewer_cannot_submit() {
    let env = create_test_env().await;

    let response = bearer(
        env.server.post("/functions/v1/submit-performance-data"),
        &env.reviewer_token,
    )
    .json(&performance(env.facility_id))
    .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

// ============ Review ============

#[tokio::test]
async fn test_approve_twice_is_idempotent() {
    let env = create_test_env().await;
    let id = submit(&env).await;
    let body = json!({
        "entity_type": "performance_data",
        "entity_id": id,
        "new_status": "approved",
    });

    let first = review(&env, body.clone()).await;
    first.assert_status_ok();
    let first: Value = first.json();
    assert_eq!(first["data"]["status"], "approved");
    assert_eq!(first["data"]["changed"], true);

    let second = review(&env, body).await;
    second.assert_status_ok();
    let second: Value = second.json();
    assert_eq!(second["data"]["status"], "approved");
    assert_eq!(second["data"]["changed"], false);
    assert_eq!(env.platform.store.len(Collection::AuditLogs).await, 1);
}

#[tokio::test]
async fn test_reject_requires_reason() {
    let env = create_test_env().await;
    let id = submit(&env).await;

    let response = review(
        &env,
        json!({
            "entity_type": "performance_data",
            "entity_id": id,
            "new_status": "rejected",
        }),
    )
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("rejection_reason"));
    assert_eq!(env.platform.store.len(Collection::AuditLogs).await, 0);
}

#[tokio::test]
async fn test_send_back_requires_comments() {
    let env = create_test_env().await;
    let id = submit(&env).await;

    let response = review(
        &env,
        json!({
            "entity_type": "performance_data",
            "entity_id": id,
            "new_status": "sent_back",
            "comments": "   ",
        }),
    )
    .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let response = review(
        &env,
        json!({
            "entity_type": "performance_data",
            "entity_id": id,
            "new_status": "sent_back",
            "comments": "January totals do not match the register",
        }),
    )
    .await;
    response.assert_status_ok();
}

#[tokio::test]
async fn test_invalid_entity_type() {
    let env = create_test_env().await;

    let response = review(
        &env,
        json!({
            "entity_type": "profiles",
            "entity_id": Uuid::new_v4(),
            "new_status": "approved",
        }),
    )
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("entity_type"));
}

#[tokio::test]
async fn test_hospital_user_cannot_review() {
    let env = create_test_env().await;
    let id = submit(&env).await;

    let response = bearer(
        env.server.post("/functions/v1/review-submission"),
        &env.hospital_token,
    )
    .json(&json!({
        "entity_type": "performance_data",
        "entity_id": id,
        "new_status": "approved",
    }))
    .await;

    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_terminal_status_cannot_change() {
    let env = create_test_env().await;
    let id = submit(&env).await;
    review(
        &env,
        json!({ "entity_type": "performance_data", "entity_id": id, "new_status": "approved" }),
    )
    .await
    .assert_status_ok();

    let response = review(
        &env,
        json!({
            "entity_type": "performance_data",
            "entity_id": id,
            "new_status": "rejected",
            "rejection_reason": "Duplicate",
        }),
    )
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Invalid status transition"));
}

// ============ Analytics ============

#[tokio::test]
async fn test_performance_analytics() {
    let env = create_test_env().await;
    submit(&env).await;

    let response = bearer(
        env.server.post("/functions/v1/performance-analytics"),
        &env.reviewer_token,
    )
    .json(&json!({ "start_date": "2024-01-01", "end_date": "2024-12-31" }))
    .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn test_analytics_date_order() {
    let env = create_test_env().await;

    let response = bearer(
        env.server.post("/functions/v1/performance-analytics"),
        &env.reviewer_token,
    )
    .json(&json!({ "start_date": "2024-12-31", "end_date": "2024-01-01" }))
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_dashboard_for_role() {
    let env = create_test_env().await;
    submit(&env).await;

    let response = bearer(env.server.get("/functions/v1/dashboard"), &env.hospital_token).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["facility_id"], env.facility_id.to_string());
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("get_hospital_dashboard"));
}

#[tokio::test]
async fn test_dashboard_rejects_bad_id() {
    let env = create_test_env().await;

    let response = bearer(
        env.server
            .get("/functions/v1/dashboard")
            .add_query_param("district_id", "1234"),
        &env.reviewer_token,
    )
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

// ============ Documents ============

#[tokio::test]
async fn test_upload_document() {
    let env = create_test_env().await;
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"%PDF-1.4 monthly report".to_vec())
            .file_name("march report.pdf")
            .mime_type("application/pdf"),
    );

    let response = bearer(
        env.server.post("/functions/v1/upload-document"),
        &env.hospital_token,
    )
    .multipart(form)
    .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let document = &body["data"]["document"];
    assert_eq!(document["category"], "general");
    assert_eq!(document["mime_type"], "application/pdf");
    assert_eq!(document["size_bytes"], 23);
    let path = document["storage_path"].as_str().unwrap();
    assert!(body["data"]["signed_url"].as_str().unwrap().contains(path));
    assert_eq!(body["data"]["expires_in"], 3600);
    assert_eq!(env.platform.store.len(Collection::Documents).await, 1);
    assert!(env.platform.storage.get(path).await.is_some());
}

/// Store that refuses document metadata rows
struct NoDocuments(hdims_db::memory::MemoryStore);

#[axum::async_trait]
impl DataStore for NoDocuments {
    async fn select(&self, table: Collection, query: &Query) -> DbResult<Selection> {
        self.0.select(table, query).await
    }

    async fn insert(&self, table: Collection, row: Value) -> DbResult<Value> {
        if table == Collection::Documents {
            return Err(DbError::Constraint("documents table is read-only".into()));
        }
        self.0.insert(table, row).await
    }

    async fn update(&self, table: Collection, patch: Value, query: &Query) -> DbResult<Vec<Value>> {
        self.0.update(table, patch, query).await
    }

    async fn delete(&self, table: Collection, query: &Query) -> DbResult<Vec<Value>> {
        self.0.delete(table, query).await
    }
}

#[tokio::test]
async fn test_upload_removed_when_metadata_insert_fails() {
    let env = create_test_env().await;
    let platform = Platform {
        store: Arc::new(NoDocuments(env.platform.store.clone())),
        ..env.platform.platform()
    };
    let server = TestServer::new(create_router(AppState::new(platform, Backend::Memory))).unwrap();
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"%PDF-1.4 monthly report".to_vec()).file_name("march report.pdf"),
    );

    let response = bearer(server.post("/functions/v1/upload-document"), &env.hospital_token)
        .multipart(form)
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(env.platform.storage.len().await, 0);
    assert_eq!(env.platform.store.len(Collection::Documents).await, 0);
}

#[tokio::test]
async fn test_upload_with_category() {
    let env = create_test_env().await;
    let form = MultipartForm::new()
        .add_text("category", "scheme-evidence")
        .add_part("file", Part::bytes(b"a,b\n1,2\n".to_vec()).file_name("beneficiaries.csv"));

    let response = bearer(
        env.server.post("/functions/v1/upload-document"),
        &env.hospital_token,
    )
    .multipart(form)
    .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["document"]["category"], "scheme-evidence");
}

#[tokio::test]
async fn test_upload_without_file() {
    let env = create_test_env().await;
    let form = MultipartForm::new().add_text("category", "general");

    let response = bearer(
        env.server.post("/functions/v1/upload-document"),
        &env.hospital_token,
    )
    .multipart(form)
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"], "Bad request: No file provided");
}

#[tokio::test]
async fn test_upload_too_large() {
    let env = create_test_env().await;
    let form = MultipartForm::new().add_part(
        "file",
        Part::bytes(vec![0u8; MAX_DOCUMENT_BYTES as usize + 1]).file_name("scan.tiff"),
    );

    let response = bearer(
        env.server.post("/functions/v1/upload-document"),
        &env.hospital_token,
    )
    .multipart(form)
    .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("File too large"));
    assert_eq!(env.platform.store.len(Collection::Documents).await, 0);
}

// ============ Sessions ============

#[tokio::test]
async fn test_signed_out_token_rejected() {
    let env = create_test_env().await;
    env.platform.auth.sign_out(&env.hospital_token).await.unwrap();

    let response = bearer(
        env.server.post("/functions/v1/submit-performance-data"),
        &env.hospital_token,
    )
    .json(&performance(env.facility_id))
    .await;

    response.assert_status(StatusCode::FORBIDDEN);
}
