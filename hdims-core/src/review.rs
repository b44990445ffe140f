//! Review state machine
//!
//! A reviewer moves a submission from `pending` (or `under_review`) to a
//! decision. Approved and rejected records are final. A record that was sent
//! back stays sent back; the facility submits a new record instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{ReviewError, ReviewResult};
use crate::types::{EntityType, SubmissionStatus};
use crate::validation::guards;

/// Status a reviewer may set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    Rejected,
    SentBack,
    UnderReview,
}

impl ReviewDecision {
    pub fn as_str(&self) -> &'static str {
        self.target_status().as_str()
    }

    pub fn parse(s: &str) -> ReviewResult<Self> {
        match s {
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            "sent_back" => Ok(Self::SentBack),
            "under_review" => Ok(Self::UnderReview),
            other => Err(ReviewError::InvalidStatus(other.to_string())),
        }
    }

    pub fn target_status(&self) -> SubmissionStatus {
        match self {
            Self::Approved => SubmissionStatus::Approved,
            Self::Rejected => SubmissionStatus::Rejected,
            Self::SentBack => SubmissionStatus::SentBack,
            Self::UnderReview => SubmissionStatus::UnderReview,
        }
    }
}

impl std::fmt::Display for ReviewDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reviewer's decision on one submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub entity_type: EntityType,
    pub entity_id: Uuid,
    pub new_status: ReviewDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl ReviewRequest {
    pub fn new(entity_type: EntityType, entity_id: Uuid, new_status: ReviewDecision) -> Self {
        Self {
            entity_type,
            entity_id,
            new_status,
            comments: None,
            rejection_reason: None,
        }
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    pub fn with_rejection_reason(mut self, reason: impl Into<String>) -> Self {
        self.rejection_reason = Some(reason.into());
        self
    }

    /// Decision-specific requirements
    ///
    /// Rejections need a reason, send-backs need comments for the facility.
    pub fn validate(&self) -> ReviewResult<()> {
        let has = |v: &Option<String>| v.as_deref().and_then(guards::non_blank).is_some();
        match self.new_status {
            ReviewDecision::Rejected if !has(&self.rejection_reason) => {
                Err(ReviewError::MissingRejectionReason)
            }
            ReviewDecision::SentBack if !has(&self.comments) => Err(ReviewError::MissingComments),
            _ => Ok(()),
        }
    }

    /// Parameters for the `review_submission` procedure
    ///
    /// Same keys as the function payload, so either can be forwarded.
    pub fn to_rpc_params(&self) -> Value {
        json!({
            "entity_type": self.entity_type.as_str(),
            "entity_id": self.entity_id,
            "new_status": self.new_status.as_str(),
            "comments": self.comments,
            "rejection_reason": self.rejection_reason,
        })
    }
}

/// Review columns carried by every submission record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    #[serde(default)]
    pub status: SubmissionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewer_comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

/// Result of applying a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReviewOutcome {
    pub previous: SubmissionStatus,
    pub current: SubmissionStatus,
    pub changed: bool,
}

impl ReviewState {
    /// Apply a reviewer decision
    ///
    /// Re-applying the current status leaves the record untouched and reports
    /// `changed: false`.
    pub fn apply(
        &mut self,
        request: &ReviewRequest,
        reviewer: Uuid,
        now: DateTime<Utc>,
    ) -> ReviewResult<ReviewOutcome> {
        request.validate()?;

        let previous = self.status;
        let target = request.new_status.target_status();
        if !previous.can_transition_to(target) {
            return Err(ReviewError::InvalidTransition {
                from: previous,
                to: target,
            });
        }
        if previous == target {
            return Ok(ReviewOutcome {
                previous,
                current: previous,
                changed: false,
            });
        }

        self.status = target;
        self.reviewer_comments = request
            .comments
            .as_deref()
            .and_then(guards::non_blank)
            .map(str::to_string);
        self.rejection_reason = match target {
            SubmissionStatus::Rejected => request
                .rejection_reason
                .as_deref()
                .and_then(guards::non_blank)
                .map(str::to_string),
            _ => None,
        };
        self.reviewed_by = Some(reviewer);
        self.reviewed_at = Some(now);

        Ok(ReviewOutcome {
            previous,
            current: target,
            changed: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(decision: ReviewDecision) -> ReviewRequest {
        ReviewRequest::new(EntityType::PerformanceData, Uuid::new_v4(), decision)
    }

    #[test]
    fn test_approve_pending() {
        let mut state = ReviewState::default();
        let reviewer = Uuid::new_v4();
        let outcome = state
            .apply(&request(ReviewDecision::Approved), reviewer, Utc::now())
            .unwrap();
        assert!(outcome.changed);
        assert_eq!(outcome.previous, SubmissionStatus::Pending);
        assert_eq!(state.status, SubmissionStatus::Approved);
        assert_eq!(state.reviewed_by, Some(reviewer));
        assert!(state.reviewed_at.is_some());
    }

    #[test]
    fn test_reject_requires_reason() {
        let mut state = ReviewState::default();
        let err = state
            .apply(&request(ReviewDecision::Rejected), Uuid::new_v4(), Utc::now())
            .unwrap_err();
        assert_eq!(err, ReviewError::MissingRejectionReason);
        assert_eq!(state, ReviewState::default());

        let req = request(ReviewDecision::Rejected).with_rejection_reason("Figures do not match");
        state.apply(&req, Uuid::new_v4(), Utc::now()).unwrap();
        assert_eq!(state.rejection_reason.as_deref(), Some("Figures do not match"));
    }

    #[test]
    fn test_send_back_requires_comments() {
        let mut state = ReviewState::default();
        let err = state
            .apply(
                &request(ReviewDecision::SentBack).with_comments("  "),
                Uuid::new_v4(),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err, ReviewError::MissingComments);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut state = ReviewState {
            status: SubmissionStatus::Approved,
            ..Default::default()
        };
        let req = request(ReviewDecision::Rejected).with_rejection_reason("late");
        let err = state.apply(&req, Uuid::new_v4(), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            ReviewError::InvalidTransition {
                from: SubmissionStatus::Approved,
                to: SubmissionStatus::Rejected,
            }
        );
        assert_eq!(err.to_string(), "Invalid status transition: approved -> rejected");
    }

    #[test]
    fn test_same_status_is_noop() {
        let reviewer = Uuid::new_v4();
        let mut state = ReviewState::default();
        state
            .apply(&request(ReviewDecision::Approved), reviewer, Utc::now())
            .unwrap();
        let before = state.clone();
        let outcome = state
            .apply(&request(ReviewDecision::Approved), Uuid::new_v4(), Utc::now())
            .unwrap();
        assert!(!outcome.changed);
        assert_eq!(state, before);
    }

    #[test]
    fn test_under_review_then_decision() {
        let mut state = ReviewState::default();
        state
            .apply(&request(ReviewDecision::UnderReview), Uuid::new_v4(), Utc::now())
            .unwrap();
        assert_eq!(state.status, SubmissionStatus::UnderReview);
        let req = request(ReviewDecision::SentBack).with_comments("Attach the register scan");
        state.apply(&req, Uuid::new_v4(), Utc::now()).unwrap();
        assert_eq!(state.status, SubmissionStatus::SentBack);
        assert_eq!(
            state.reviewer_comments.as_deref(),
            Some("Attach the register scan")
        );
    }

    #[test]
    fn test_sent_back_accepts_no_decision() {
        let mut state = ReviewState {
            status: SubmissionStatus::SentBack,
            ..Default::default()
        };
        assert!(state
            .apply(&request(ReviewDecision::Approved), Uuid::new_v4(), Utc::now())
            .is_err());
    }

    #[test]
    fn test_decision_parse() {
        assert_eq!(ReviewDecision::parse("sent_back").unwrap(), ReviewDecision::SentBack);
        assert!(matches!(
            ReviewDecision::parse("Approved"),
            Err(ReviewError::InvalidStatus(_))
        ));
        assert!(ReviewDecision::parse("pending").is_err());
    }

    #[test]
    fn test_rpc_params() {
        let req = request(ReviewDecision::Rejected).with_rejection_reason("duplicate");
        let params = req.to_rpc_params();
        assert_eq!(params["entity_type"], "performance_data");
        assert_eq!(params["new_status"], "rejected");
        assert_eq!(params["rejection_reason"], "duplicate");
        assert!(params["comments"].is_null());
        let back = crate::validation::validate_review_payload(&params).unwrap();
        assert_eq!(back, req);
    }
}
