//! Users, roles and permissions
//!
//! Every user holds exactly one persisted role. The dashboard works with a
//! shorter frontend role derived from it.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Permission enumeration for HDIMS operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    SubmitData,
    UploadDocuments,
    ViewOwnSubmissions,
    ReviewSubmissions,
    ViewAnalytics,
    ManageLocations,
    ManageUsers,
}

/// Persisted role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    HospitalUser,
    DistrictAdmin,
    StateAdmin,
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::HospitalUser => "hospital_user",
            Role::DistrictAdmin => "district_admin",
            Role::StateAdmin => "state_admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hospital_user" => Some(Role::HospitalUser),
            "district_admin" => Some(Role::DistrictAdmin),
            "state_admin" => Some(Role::StateAdmin),
            "super_admin" | "superadmin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    /// Frontend role used for routing and dashboards
    pub fn frontend(&self) -> FrontendRole {
        match self {
            Role::HospitalUser => FrontendRole::Hospital,
            Role::DistrictAdmin => FrontendRole::District,
            Role::StateAdmin => FrontendRole::State,
            Role::SuperAdmin => FrontendRole::Admin,
        }
    }

    /// Whether users with this role may transition submissions
    pub fn is_reviewer(&self) -> bool {
        !matches!(self, Role::HospitalUser)
    }

    /// Default permissions for this role
    pub fn default_permissions(&self) -> HashSet<Permission> {
        let mut perms = HashSet::new();

        match self {
            Role::HospitalUser => {
                perms.insert(Permission::SubmitData);
                perms.insert(Permission::UploadDocuments);
                perms.insert(Permission::ViewOwnSubmissions);
            }
            Role::DistrictAdmin | Role::StateAdmin => {
                perms.insert(Permission::UploadDocuments);
                perms.insert(Permission::ReviewSubmissions);
                perms.insert(Permission::ViewAnalytics);
            }
            Role::SuperAdmin => {
                perms.insert(Permission::UploadDocuments);
                perms.insert(Permission::ReviewSubmissions);
                perms.insert(Permission::ViewAnalytics);
                perms.insert(Permission::ManageLocations);
                perms.insert(Permission::ManageUsers);
            }
        }

        perms
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.default_permissions().contains(&permission)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role as seen by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrontendRole {
    Hospital,
    District,
    State,
    Admin,
}

impl FrontendRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrontendRole::Hospital => "hospital",
            FrontendRole::District => "district",
            FrontendRole::State => "state",
            FrontendRole::Admin => "admin",
        }
    }
}

/// User profile row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facility_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_id: Option<Uuid>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl UserProfile {
    pub fn frontend_role(&self) -> FrontendRole {
        self.role.frontend()
    }

    /// Active users only; inactive accounts lose every permission
    pub fn can(&self, permission: Permission) -> bool {
        self.is_active && self.role.has_permission(permission)
    }
}

fn default_active() -> bool {
    true
}
