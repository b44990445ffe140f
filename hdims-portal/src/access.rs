//! Route gating
//!
//! Every route names the frontend roles that may open it. Inactive users
//! are denied everywhere.

use hdims_core::FrontendRole::{self, Admin, District, Hospital, State};
use hdims_core::UserProfile;

const SIGNED_IN: &[FrontendRole] = &[Hospital, District, State, Admin];
const FACILITY: &[FrontendRole] = &[Hospital];
const REVIEWERS: &[FrontendRole] = &[District, State, Admin];
const ADMIN: &[FrontendRole] = &[Admin];

/// Portal routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Login,
    Dashboard,
    SubmitPerformance,
    SubmitScheme,
    Documents,
    MySubmissions,
    ReviewQueue,
    Analytics,
    ManageLocations,
    ManageUsers,
}

/// Outcome of a gate check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    /// No session: send the visitor to the login page
    RedirectToLogin,
    Denied,
}

impl Route {
    pub const ALL: [Route; 10] = [
        Route::Login,
        Route::Dashboard,
        Route::SubmitPerformance,
        Route::SubmitScheme,
        Route::Documents,
        Route::MySubmissions,
        Route::ReviewQueue,
        Route::Analytics,
        Route::ManageLocations,
        Route::ManageUsers,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
            Route::SubmitPerformance => "/submit/performance",
            Route::SubmitScheme => "/submit/scheme",
            Route::Documents => "/documents",
            Route::MySubmissions => "/submissions",
            Route::ReviewQueue => "/review",
            Route::Analytics => "/analytics",
            Route::ManageLocations => "/admin/locations",
            Route::ManageUsers => "/admin/users",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.trim_end_matches('/');
        Self::ALL.into_iter().find(|r| r.path() == path)
    }

    /// Roles allowed in; `None` means public
    pub fn allowed_roles(&self) -> Option<&'static [FrontendRole]> {
        match self {
            Route::Login => None,
            Route::Dashboard | Route::Documents => Some(SIGNED_IN),
            Route::SubmitPerformance | Route::SubmitScheme | Route::MySubmissions => Some(FACILITY),
            Route::ReviewQueue | Route::Analytics => Some(REVIEWERS),
            Route::ManageLocations | Route::ManageUsers => Some(ADMIN),
        }
    }

    pub fn check(&self, profile: Option<&UserProfile>) -> Access {
        let Some(roles) = self.allowed_roles() else {
            return Access::Allowed;
        };
        match profile {
            None => Access::RedirectToLogin,
            Some(p) if !p.is_active => Access::Denied,
            Some(p) if roles.contains(&p.frontend_role()) => Access::Allowed,
            Some(_) => Access::Denied,
        }
    }
}

/// Landing route after sign-in
pub fn home(profile: &UserProfile) -> Route {
    if profile.is_active {
        Route::Dashboard
    } else {
        Route::Login
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdims_core::Role;
    use uuid::Uuid;

    fn profile(role: Role, active: bool) -> UserProfile {
        UserProfile {
            id: Uuid::new_v4(),
            email: "user@example.org".into(),
            full_name: String::new(),
            role,
            facility_id: None,
            district_id: None,
            state_id: None,
            is_active: active,
        }
    }

    #[test]
    fn test_login_is_public() {
        assert_eq!(Route::Login.check(None), Access::Allowed);
        assert_eq!(Route::Dashboard.check(None), Access::RedirectToLogin);
    }

    #[test]
    fn test_role_gates() {
        let hospital = profile(Role::HospitalUser, true);
        let district = profile(Role::DistrictAdmin, true);
        let admin = profile(Role::SuperAdmin, true);

        assert_eq!(Route::SubmitPerformance.check(Some(&hospital)), Access::Allowed);
        assert_eq!(Route::ReviewQueue.check(Some(&hospital)), Access::Denied);
        assert_eq!(Route::ReviewQueue.check(Some(&district)), Access::Allowed);
        assert_eq!(Route::ManageUsers.check(Some(&district)), Access::Denied);
        assert_eq!(Route::ManageUsers.check(Some(&admin)), Access::Allowed);
    }

    #[test]
    fn test_inactive_denied_everywhere() {
        let inactive = profile(Role::SuperAdmin, false);
        for route in Route::ALL.into_iter().filter(|r| *r != Route::Login) {
            assert_eq!(route.check(Some(&inactive)), Access::Denied);
        }
        assert_eq!(home(&inactive), Route::Login);
    }

    #[test]
    fn test_from_path() {
        assert_eq!(Route::from_path("/review/"), Some(Route::ReviewQueue));
        assert_eq!(Route::from_path("/nowhere"), None);
    }
}
