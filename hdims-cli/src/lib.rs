//! HDIMS CLI
//!
//! Operator tool for the Healthcare Data Information Management System.
//!
//! ## Commands
//!
//! - `serve`: run the serverless functions over the memory or hosted backend
//! - `import`: bulk-load districts or facilities from CSV
//! - `validate`: run the trust-boundary checks over a JSON payload offline
//! - `health`: probe a running functions server

pub mod client;
pub mod commands;
pub mod error;
pub mod handler;
pub mod output;

pub use client::{HdimsClient, HealthStatus};
pub use commands::{Cli, Commands, OutputFormat};
pub use error::{CliError, CliResult};

/// CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
