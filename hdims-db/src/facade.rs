//! Data-access facade
//!
//! The contracts every backend implements: table access, stored procedures,
//! object storage and authentication. Errors come back as [`DbError`] with the
//! platform's message preserved.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use uuid::Uuid;

use hdims_core::{Collection, Role};

use crate::error::{DbError, DbResult};
use crate::query::{Query, Selection};

/// Stored procedures exposed by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Procedure {
    SubmitPerformanceData,
    SubmitSchemeData,
    ReviewSubmission,
    GetHospitalDashboard,
    GetDistrictDashboard,
    GetStateDashboard,
    GetSuperadminOverview,
    GetPerformanceTrends,
}

impl Procedure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubmitPerformanceData => "submit_performance_data",
            Self::SubmitSchemeData => "submit_scheme_data",
            Self::ReviewSubmission => "review_submission",
            Self::GetHospitalDashboard => "get_hospital_dashboard",
            Self::GetDistrictDashboard => "get_district_dashboard",
            Self::GetStateDashboard => "get_state_dashboard",
            Self::GetSuperadminOverview => "get_superadmin_overview",
            Self::GetPerformanceTrends => "get_performance_trends",
        }
    }

    pub fn parse(name: &str) -> DbResult<Self> {
        match name {
            "submit_performance_data" => Ok(Self::SubmitPerformanceData),
            "submit_scheme_data" => Ok(Self::SubmitSchemeData),
            "review_submission" => Ok(Self::ReviewSubmission),
            "get_hospital_dashboard" => Ok(Self::GetHospitalDashboard),
            "get_district_dashboard" => Ok(Self::GetDistrictDashboard),
            "get_state_dashboard" => Ok(Self::GetStateDashboard),
            "get_superadmin_overview" => Ok(Self::GetSuperadminOverview),
            "get_performance_trends" => Ok(Self::GetPerformanceTrends),
            other => Err(DbError::UnknownProcedure(other.to_string())),
        }
    }

    /// Dashboard procedure for a persisted role
    pub fn dashboard_for(role: Role) -> Self {
        match role {
            Role::HospitalUser => Self::GetHospitalDashboard,
            Role::DistrictAdmin => Self::GetDistrictDashboard,
            Role::StateAdmin => Self::GetStateDashboard,
            Role::SuperAdmin => Self::GetSuperadminOverview,
        }
    }
}

impl std::fmt::Display for Procedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity a procedure runs as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Uuid,
    pub access_token: String,
}

impl Caller {
    pub fn new(user_id: Uuid, access_token: impl Into<String>) -> Self {
        Self {
            user_id,
            access_token: access_token.into(),
        }
    }
}

/// Table access
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(&self, table: Collection, query: &Query) -> DbResult<Selection>;

    /// Insert one row, returning it as stored
    async fn insert(&self, table: Collection, row: Value) -> DbResult<Value>;

    /// Merge `patch` into every matching row, returning the updated rows
    async fn update(&self, table: Collection, patch: Value, query: &Query) -> DbResult<Vec<Value>>;

    /// Delete matching rows, returning them
    async fn delete(&self, table: Collection, query: &Query) -> DbResult<Vec<Value>>;
}

/// Stored-procedure invocation with named JSON params
#[async_trait]
pub trait RpcBackend: Send + Sync {
    async fn rpc(&self, caller: &Caller, procedure: Procedure, params: Value) -> DbResult<Value>;
}

/// Upload options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    pub content_type: String,
    /// Seconds, sent as `max-age`
    pub cache_control: u32,
    /// Overwrite an existing object
    pub upsert: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            content_type: "application/octet-stream".to_string(),
            cache_control: 3600,
            upsert: false,
        }
    }
}

/// Object storage bucket
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store bytes at `path`, returning the stored path
    async fn upload(&self, path: &str, bytes: Vec<u8>, options: &UploadOptions) -> DbResult<String>;

    fn public_url(&self, path: &str) -> String;

    async fn signed_url(&self, path: &str, expires_in_secs: u64) -> DbResult<String>;

    /// Delete the object at `path`; a missing object is not an error
    async fn remove(&self, path: &str) -> DbResult<()>;
}

/// Authenticated account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

/// Signed-in session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthUser,
}

impl AuthSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn caller(&self) -> Caller {
        Caller::new(self.user.id, self.access_token.clone())
    }
}

/// Auth state changes broadcast to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    SignedOut { user_id: Uuid },
}

/// Authentication provider
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> DbResult<AuthSession>;

    async fn sign_up(&self, email: &str, password: &str) -> DbResult<AuthUser>;

    /// Session for an access token, `None` when unknown or expired
    async fn get_session(&self, access_token: &str) -> DbResult<Option<AuthSession>>;

    async fn get_user(&self, access_token: &str) -> DbResult<AuthUser>;

    async fn sign_out(&self, access_token: &str) -> DbResult<()>;

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent>;
}

/// The four platform contracts behind one handle
#[derive(Clone)]
pub struct Platform {
    pub store: Arc<dyn DataStore>,
    pub rpc: Arc<dyn RpcBackend>,
    pub storage: Arc<dyn ObjectStorage>,
    pub auth: Arc<dyn AuthProvider>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_procedure_names_round_trip() {
        for p in [
            Procedure::SubmitPerformanceData,
            Procedure::ReviewSubmission,
            Procedure::GetSuperadminOverview,
            Procedure::GetPerformanceTrends,
        ] {
            assert_eq!(Procedure::parse(p.as_str()).unwrap(), p);
        }
        assert!(matches!(
            Procedure::parse("drop_everything"),
            Err(DbError::UnknownProcedure(_))
        ));
    }

    #[test]
    fn test_dashboard_for_role() {
        assert_eq!(
            Procedure::dashboard_for(Role::StateAdmin),
            Procedure::GetStateDashboard
        );
        assert_eq!(
            Procedure::dashboard_for(Role::SuperAdmin),
            Procedure::GetSuperadminOverview
        );
    }
}
