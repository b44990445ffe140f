//! Submission records
//!
//! Facilities submit two kinds of data: program performance metrics and
//! welfare-scheme tracking. Both share the review fields in [`ReviewState`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ReviewError;
use crate::review::ReviewState;
use crate::types::Collection;

/// Review status of a submission
///
/// `submitted` is accepted on the wire as another name for `pending`, and
/// `corrected` as another name for `sent_back`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    #[serde(alias = "submitted", alias = "Submitted")]
    Pending,
    UnderReview,
    Approved,
    Rejected,
    #[serde(alias = "corrected", alias = "Corrected")]
    SentBack,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::UnderReview => "under_review",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::SentBack => "sent_back",
        }
    }

    /// Label shown to facility users
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Submitted",
            Self::UnderReview => "Under Review",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
            Self::SentBack => "Corrected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" | "submitted" => Some(Self::Pending),
            "under_review" => Some(Self::UnderReview),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "sent_back" | "corrected" => Some(Self::SentBack),
            _ => None,
        }
    }

    /// Whether no further review is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }

    /// Whether the record still sits in a reviewer's queue
    pub fn awaits_review(&self) -> bool {
        matches!(self, Self::Pending | Self::UnderReview)
    }

    /// Whether a reviewer may move a record from this status to `target`
    ///
    /// Re-applying the current status is always allowed and is a no-op.
    pub fn can_transition_to(&self, target: SubmissionStatus) -> bool {
        if *self == target {
            return true;
        }
        match (self, target) {
            (Self::Pending, Self::UnderReview) => true,
            (Self::Pending, Self::Approved) => true,
            (Self::Pending, Self::Rejected) => true,
            (Self::Pending, Self::SentBack) => true,

            (Self::UnderReview, Self::Approved) => true,
            (Self::UnderReview, Self::Rejected) => true,
            (Self::UnderReview, Self::SentBack) => true,

            _ => false,
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of submission a review targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    PerformanceData,
    SchemeTracking,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerformanceData => "performance_data",
            Self::SchemeTracking => "scheme_tracking",
        }
    }

    /// Parse the wire value; anything else is rejected
    pub fn parse(s: &str) -> Result<Self, ReviewError> {
        match s {
            "performance_data" => Ok(Self::PerformanceData),
            "scheme_tracking" => Ok(Self::SchemeTracking),
            other => Err(ReviewError::InvalidEntityType(other.to_string())),
        }
    }

    /// Collection holding records of this kind
    pub fn collection(&self) -> Collection {
        match self {
            Self::PerformanceData => Collection::PerformanceData,
            Self::SchemeTracking => Collection::SchemeTracking,
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single reported metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub metric_type: String,
    pub metric_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Performance data as submitted by a facility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSubmission {
    pub facility_id: Uuid,
    pub program: String,
    pub reporting_start: NaiveDate,
    pub reporting_end: NaiveDate,
    pub metrics: Vec<Metric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub doc_ids: Vec<Uuid>,
}

/// Welfare-scheme tracking data as submitted by a facility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeSubmission {
    pub facility_id: Uuid,
    pub scheme_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporting_start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporting_end: Option<NaiveDate>,
    pub beneficiary_count: u64,
    pub funds_allocated: f64,
    pub funds_utilized: f64,
    pub activities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub doc_ids: Vec<Uuid>,
}

impl SchemeSubmission {
    /// Share of allocated funds already used, in percent
    pub fn utilization_percent(&self) -> Option<f64> {
        if self.funds_allocated > 0.0 {
            Some(self.funds_utilized / self.funds_allocated * 100.0)
        } else {
            None
        }
    }
}

/// Persisted performance-data record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub submission: PerformanceSubmission,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub review: ReviewState,
}

/// Persisted scheme-tracking record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemeRecord {
    pub id: Uuid,
    #[serde(flatten)]
    pub submission: SchemeSubmission,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub review: ReviewState,
}
