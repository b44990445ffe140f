//! Role dashboards
//!
//! One variant per frontend role, picked once from the session and loaded
//! from the matching procedure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use hdims_core::{EntityType, FacilityType, FrontendRole, SubmissionStatus};
use hdims_db::{Platform, Procedure};

use crate::error::PortalResult;
use crate::session::CurrentUser;

/// Submission counts by status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub under_review: u64,
    #[serde(default)]
    pub approved: u64,
    #[serde(default)]
    pub rejected: u64,
    #[serde(default)]
    pub sent_back: u64,
    #[serde(default)]
    pub total: u64,
}

impl StatusCounts {
    pub fn awaiting_review(&self) -> u64 {
        self.pending + self.under_review
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentSubmission {
    pub id: Uuid,
    pub entity_type: EntityType,
    #[serde(default)]
    pub title: Option<String>,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalDashboard {
    pub facility_id: Uuid,
    pub performance: StatusCounts,
    pub scheme: StatusCounts,
    #[serde(default)]
    pub recent_submissions: Vec<RecentSubmission>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilitySummary {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub facility_type: FacilityType,
    pub is_active: bool,
    pub submissions: u64,
    pub pending_reviews: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictDashboard {
    pub district_id: Uuid,
    pub facility_count: u64,
    pub pending_reviews: u64,
    pub performance: StatusCounts,
    pub scheme: StatusCounts,
    #[serde(default)]
    pub facilities: Vec<FacilitySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictSummary {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    pub facility_count: u64,
    pub pending_reviews: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDashboard {
    pub state_id: Uuid,
    pub district_count: u64,
    pub facility_count: u64,
    pub pending_reviews: u64,
    pub performance: StatusCounts,
    pub scheme: StatusCounts,
    #[serde(default)]
    pub districts: Vec<DistrictSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminOverview {
    pub states: u64,
    pub districts: u64,
    pub facilities: u64,
    pub users: u64,
    pub active_users: u64,
    pub pending_reviews: u64,
    pub performance: StatusCounts,
    pub scheme: StatusCounts,
}

/// Dashboard data for the signed-in role
#[derive(Debug, Clone, PartialEq)]
pub enum Dashboard {
    Hospital(HospitalDashboard),
    District(DistrictDashboard),
    State(StateDashboard),
    Admin(AdminOverview),
}

impl Dashboard {
    /// Load the dashboard matching the user's role
    pub async fn load(platform: &Platform, user: &CurrentUser) -> PortalResult<Self> {
        let role = user.role();
        let procedure = Procedure::dashboard_for(user.profile.role);
        let data = platform
            .rpc
            .rpc(&user.caller(), procedure, json!({}))
            .await?;
        debug!(procedure = %procedure, user_id = %user.profile.id, "Dashboard loaded");
        Self::from_value(role, data)
    }

    /// Decode a procedure result for `role`
    pub fn from_value(role: FrontendRole, data: Value) -> PortalResult<Self> {
        Ok(match role {
            FrontendRole::Hospital => Self::Hospital(serde_json::from_value(data)?),
            FrontendRole::District => Self::District(serde_json::from_value(data)?),
            FrontendRole::State => Self::State(serde_json::from_value(data)?),
            FrontendRole::Admin => Self::Admin(serde_json::from_value(data)?),
        })
    }

    pub fn role(&self) -> FrontendRole {
        match self {
            Self::Hospital(_) => FrontendRole::Hospital,
            Self::District(_) => FrontendRole::District,
            Self::State(_) => FrontendRole::State,
            Self::Admin(_) => FrontendRole::Admin,
        }
    }

    /// Submissions waiting for a reviewer within this dashboard's scope
    pub fn pending_reviews(&self) -> u64 {
        match self {
            Self::Hospital(d) => d.performance.awaiting_review() + d.scheme.awaiting_review(),
            Self::District(d) => d.pending_reviews,
            Self::State(d) => d.pending_reviews,
            Self::Admin(d) => d.pending_reviews,
        }
    }
}
