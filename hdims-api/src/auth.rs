//! Bearer token extraction
//!
//! Every function except `health` expects
//! ```text
//! Authorization: Bearer <access token>
//! ```
//! The token is resolved to a session and profile by
//! [`AppState::authenticate`](crate::state::AppState::authenticate) only after
//! the payload has been validated.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::ApiError;

/// Raw bearer token from the `Authorization` header
#[derive(Debug, Clone)]
pub struct BearerToken(pub Option<String>);

impl BearerToken {
    /// The token, or `Unauthorized` when the header was missing
    pub fn require(&self) -> Result<&str, ApiError> {
        self.0
            .as_deref()
            .ok_or_else(|| ApiError::unauthorized("missing bearer token"))
    }
}

/// Token from a header value such as `Bearer abc`
pub fn parse_bearer(value: &str) -> Option<&str> {
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_bearer)
            .map(str::to_string);
        Ok(BearerToken(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bearer() {
        assert_eq!(parse_bearer("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer("bearer  abc "), Some("abc"));
        assert_eq!(parse_bearer("Basic abc"), None);
        assert_eq!(parse_bearer("Bearer "), None);
        assert_eq!(parse_bearer("abc"), None);
    }

    #[test]
    fn test_missing_token_is_unauthorized() {
        let err = BearerToken(None).require().unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::FORBIDDEN);
    }
}
