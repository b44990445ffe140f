//! Error types for HDIMS Core

use thiserror::Error;

use crate::types::SubmissionStatus;

/// Input validation errors
///
/// Raised both by the trust-boundary payload checks and, field by field, by
/// the client-side form rules.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("Invalid type for {field}: expected {expected}")]
    InvalidType { field: String, expected: &'static str },

    #[error("{field} must be a non-negative number")]
    Negative { field: String },

    #[error("Invalid UUID for {field}: '{value}'")]
    InvalidUuid { field: String, value: String },

    #[error("Invalid date for {field}: '{value}'")]
    InvalidDate { field: String, value: String },

    #[error("{end_field} must not be before {start_field}")]
    DateOrder { start_field: String, end_field: String },

    #[error("{field} exceeds maximum length ({max}): got {actual}")]
    TooLong { field: String, max: usize, actual: usize },

    #[error("{field} must contain at least {min} item(s)")]
    TooFew { field: String, min: usize },

    #[error("Invalid value for {field}: '{value}'")]
    InvalidValue { field: String, value: String },
}

impl ValidationError {
    /// Name of the offending field, if the error is about a single field
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::NotAnObject | Self::MissingFields(_) => None,
            Self::InvalidType { field, .. }
            | Self::Negative { field }
            | Self::InvalidUuid { field, .. }
            | Self::InvalidDate { field, .. }
            | Self::TooLong { field, .. }
            | Self::TooFew { field, .. }
            | Self::InvalidValue { field, .. } => Some(field),
            Self::DateOrder { end_field, .. } => Some(end_field),
        }
    }

    pub(crate) fn missing(field: &str) -> Self {
        Self::MissingFields(vec![field.to_string()])
    }
}

/// Review transition errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReviewError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Invalid entity_type '{0}': must be performance_data or scheme_tracking")]
    InvalidEntityType(String),

    #[error("Invalid new_status '{0}': must be one of approved, rejected, sent_back, under_review")]
    InvalidStatus(String),

    #[error("rejection_reason is required when rejecting a submission")]
    MissingRejectionReason,

    #[error("comments are required when sending a submission back")]
    MissingComments,

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: SubmissionStatus,
        to: SubmissionStatus,
    },
}

/// Result type alias for validation
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Result type alias for review transitions
pub type ReviewResult<T> = Result<T, ReviewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_message_lists_all() {
        let err = ValidationError::MissingFields(vec!["program".into(), "metrics".into()]);
        assert_eq!(err.to_string(), "Missing required fields: program, metrics");
        assert_eq!(err.field(), None);
    }

    #[test]
    fn test_date_order_points_at_end_field() {
        let err = ValidationError::DateOrder {
            start_field: "reporting_start".into(),
            end_field: "reporting_end".into(),
        };
        assert_eq!(err.field(), Some("reporting_end"));
    }

    #[test]
    fn test_review_error_wraps_validation() {
        let err: ReviewError = ValidationError::missing("entity_id").into();
        assert!(err.to_string().contains("entity_id"));
    }
}
