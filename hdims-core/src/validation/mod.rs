//! Input validation
//!
//! `boundary` guards the serverless functions, `form` mirrors the same rules
//! field by field for the portal's forms.

pub mod boundary;
pub mod form;
pub mod guards;

pub use boundary::{
    validate_analytics_payload, validate_performance_payload, validate_review_payload,
    validate_scheme_payload, AnalyticsQuery,
};
pub use form::{FieldErrors, PerformanceForm, SchemeForm};
pub use guards::{is_uuid, MAX_NOTES_LEN};
