//! Data transfer objects for the HDIMS functions

use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use validator::Validate;

use hdims_core::DocumentMeta;

/// Success envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
    pub message: String,
    pub timestamp: String,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            message: message.into(),
            timestamp: Utc::now().to_rfc3339(),
        })
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub backend: String,
}

/// Dashboard query parameters
#[derive(Debug, Default, Deserialize, Validate)]
pub struct DashboardQuery {
    #[validate(length(equal = 36))]
    pub facility_id: Option<String>,

    #[validate(length(equal = 36))]
    pub district_id: Option<String>,

    #[validate(length(equal = 36))]
    pub state_id: Option<String>,
}

/// Fields of an upload after the multipart body is read
#[derive(Debug, Validate)]
pub struct UploadMeta {
    #[validate(length(min = 1, max = 255))]
    pub file_name: String,

    #[validate(length(min = 1, max = 255))]
    pub mime_type: String,

    #[validate(length(min = 1, max = 64))]
    pub category: String,
}

/// Upload function result
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub document: DocumentMeta,
    pub signed_url: String,
    pub expires_in: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_meta_limits() {
        let meta = UploadMeta {
            file_name: "report.pdf".into(),
            mime_type: "application/pdf".into(),
            category: "general".into(),
        };
        assert!(meta.validate().is_ok());

        let meta = UploadMeta {
            file_name: "x".repeat(256),
            ..meta
        };
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_dashboard_query_length() {
        let q = DashboardQuery {
            district_id: Some("short".into()),
            ..Default::default()
        };
        assert!(q.validate().is_err());
        assert!(DashboardQuery::default().validate().is_ok());
    }
}
