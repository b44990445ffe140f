//! Portal error types

use hdims_core::validation::FieldErrors;
use hdims_core::{ReviewError, ValidationError};
use hdims_db::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Not signed in")]
    NotSignedIn,

    #[error("Account is inactive")]
    InactiveAccount,

    #[error("No profile found for {0}")]
    ProfileMissing(String),

    #[error("Unauthorized: {0}")]
    Forbidden(String),

    #[error("Form has {} invalid field(s)", .0.len())]
    Form(FieldErrors),

    #[error("A submission is already in progress")]
    InFlight,

    #[error("Session storage error: {0}")]
    SessionStorage(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PortalError {
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
}

impl From<std::io::Error> for PortalError {
    fn from(err: std::io::Error) -> Self {
        Self::SessionStorage(err.to_string())
    }
}

pub type PortalResult<T> = Result<T, PortalError>;
