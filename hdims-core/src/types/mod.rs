//! HDIMS domain types
//!
//! Shape contracts for the records persisted on the hosted platform.

mod audit;
mod document;
mod location;
mod submission;
mod user;

pub use audit::*;
pub use document::*;
pub use location::*;
pub use submission::*;
pub use user::*;

/// Named collections on the hosted platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    States,
    Districts,
    Facilities,
    Profiles,
    PerformanceData,
    SchemeTracking,
    Documents,
    AuditLogs,
}

impl Collection {
    /// Table name on the platform
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::States => "states",
            Self::Districts => "districts",
            Self::Facilities => "facilities",
            Self::Profiles => "profiles",
            Self::PerformanceData => "performance_data",
            Self::SchemeTracking => "scheme_tracking",
            Self::Documents => "documents",
            Self::AuditLogs => "audit_logs",
        }
    }

    /// All collections, parents before children
    pub fn all() -> [Collection; 8] {
        [
            Self::States,
            Self::Districts,
            Self::Facilities,
            Self::Profiles,
            Self::PerformanceData,
            Self::SchemeTracking,
            Self::Documents,
            Self::AuditLogs,
        ]
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
