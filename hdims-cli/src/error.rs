//! CLI Error Types

use thiserror::Error;

use hdims_core::{ReviewError, ValidationError};
use hdims_db::DbError;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("API connection error: {message}")]
    ConnectionError { message: String },

    #[error("API request failed: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Payload rejected: {0}")]
    Rejected(String),

    #[error("Server error: {message}")]
    ServerError { message: String },

    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Platform error: {0}")]
    PlatformError(#[from] DbError),
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

impl From<ValidationError> for CliError {
    fn from(err: ValidationError) -> Self {
        CliError::Rejected(err.to_string())
    }
}

impl From<ReviewError> for CliError {
    fn from(err: ReviewError) -> Self {
        CliError::Rejected(err.to_string())
    }
}

impl CliError {
    pub fn config(message: impl Into<String>) -> Self {
        CliError::ConfigError {
            message: message.into(),
        }
    }

    pub fn invalid_arg(message: impl Into<String>) -> Self {
        CliError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        CliError::ConnectionError {
            message: message.into(),
        }
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        CliError::ApiError {
            status,
            message: message.into(),
        }
    }

    pub fn server(message: impl Into<String>) -> Self {
        CliError::ServerError {
            message: message.into(),
        }
    }

    /// Get exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ConfigError { .. } => 1,
            CliError::InvalidArgument { .. } => 2,
            CliError::ConnectionError { .. } => 3,
            CliError::ApiError { .. } => 4,
            CliError::IoError(_) => 5,
            CliError::JsonError(_) => 6,
            CliError::HttpError(_) => 7,
            CliError::Rejected(_) => 10,
            CliError::PlatformError(DbError::Config(_)) => 1,
            CliError::PlatformError(_) => 11,
            CliError::ServerError { .. } => 30,
        }
    }
}
