//! HDIMS data-access error types

use thiserror::Error;

use hdims_core::{ReviewError, ValidationError};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record already exists: {0}")]
    AlreadyExists(String),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Unknown procedure: {0}")]
    UnknownProcedure(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Platform error ({status}): {message}")]
    Platform { status: u16, message: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn platform(status: u16, message: impl Into<String>) -> Self {
        Self::Platform {
            status,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for DbError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Connection(format!("request timed out: {}", err))
        } else if err.is_decode() {
            Self::Platform {
                status: 502,
                message: format!("invalid response body: {}", err),
            }
        } else {
            Self::Connection(err.to_string())
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;
