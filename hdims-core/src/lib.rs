//! HDIMS Core
//!
//! Shared domain model for the Healthcare Data Information Management System.
//!
//! ## Modules
//!
//! - `types`: submissions, location hierarchy, users/roles, documents, audit entries
//! - `validation`: client-side form rules, trust-boundary payload checks, input guards
//! - `review`: the submission review state machine
//! - `logging`: tracing subscriber configuration shared by binaries
//!
//! ## Submission lifecycle
//!
//! ```text
//! pending ──► under_review ──► approved | rejected | sent_back
//!    └──────────────────────► approved | rejected | sent_back
//! ```
//!
//! `approved` and `rejected` are terminal. `sent_back` (shown as "Corrected")
//! waits for the facility to resubmit, which creates a new record.

pub mod error;
pub mod logging;
pub mod review;
pub mod types;
pub mod validation;

pub use error::{ReviewError, ReviewResult, ValidationError, ValidationResult};
pub use review::{ReviewDecision, ReviewOutcome, ReviewRequest, ReviewState};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
