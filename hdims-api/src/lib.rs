//! HDIMS Functions
//!
//! HTTP entry points in front of the platform's stored procedures.
//!
//! ## Endpoints
//!
//! All under `/functions/v1`; every one also answers `OPTIONS` with 200.
//!
//! - GET  /health - Liveness and backend in use
//! - POST /submit-performance-data - Validate and submit facility metrics
//! - POST /submit-scheme-data - Validate and submit scheme tracking
//! - POST /review-submission - Approve, reject, send back or take up a submission
//! - POST /performance-analytics - Monthly performance trends
//! - GET  /dashboard - The caller's role dashboard
//! - POST /upload-document - Multipart document upload (10 MiB max)

pub mod auth;
pub mod dto;
pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use dto::*;
pub use error::*;
pub use routes::*;
pub use server::*;
pub use state::*;
