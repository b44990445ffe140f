//! Application state and server configuration

use std::net::{AddrParseError, SocketAddr};

use chrono::Utc;
use hdims_core::{Collection, DocumentMeta, Permission, UserProfile};
use hdims_db::{AuthSession, Backend, Platform, Query};

use crate::error::{ApiError, ApiResult};

/// Lifetime of signed document URLs, in seconds
pub const SIGNED_URL_TTL_SECS: u64 = 3600;

/// API server state
#[derive(Clone, Debug)]
pub struct AppState {
    pub platform: Platform,
    pub backend: Backend,
    pub version: String,
}

/// Caller resolved from a bearer token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub session: AuthSession,
    pub profile: UserProfile,
}

impl AppState {
    pub fn new(platform: Platform, backend: Backend) -> Self {
        Self {
            platform,
            backend,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Resolve a bearer token to an active user with a profile
    pub async fn authenticate(&self, token: &str) -> ApiResult<AuthenticatedUser> {
        let session = self
            .platform
            .auth
            .get_session(token)
            .await?
            .filter(|s| !s.is_expired(Utc::now()))
            .ok_or_else(|| ApiError::unauthorized("invalid or expired session"))?;

        let row = self
            .platform
            .store
            .select(
                Collection::Profiles,
                &Query::new().eq("id", session.user.id.to_string()),
            )
            .await?
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::unauthorized("no profile for this account"))?;
        let profile: UserProfile = serde_json::from_value(row)
            .map_err(|e| ApiError::bad_request(format!("malformed profile: {}", e)))?;
        if !profile.is_active {
            return Err(ApiError::unauthorized("account is inactive"));
        }

        Ok(AuthenticatedUser { session, profile })
    }

    /// Record an uploaded document
    pub async fn insert_document(&self, meta: &DocumentMeta) -> ApiResult<()> {
        let row = serde_json::to_value(meta)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        self.platform.store.insert(Collection::Documents, row).await?;
        Ok(())
    }
}

impl AuthenticatedUser {
    /// Fail unless the profile's role grants `permission`
    pub fn require(&self, permission: Permission) -> ApiResult<()> {
        if self.profile.can(permission) {
            Ok(())
        } else {
            Err(ApiError::unauthorized(format!(
                "{} cannot {:?}",
                self.profile.role, permission
            )))
        }
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub enable_cors: bool,
    pub backend: Backend,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            enable_cors: true,
            backend: Backend::Memory,
        }
    }
}

impl ApiConfig {
    /// Create from environment variables
    ///
    /// `HDIMS_API_HOST`, `HDIMS_API_PORT`, `HDIMS_ENABLE_CORS`, `HDIMS_BACKEND`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let host = std::env::var("HDIMS_API_HOST").unwrap_or(defaults.host);
        let port = std::env::var("HDIMS_API_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.port);
        let enable_cors = std::env::var("HDIMS_ENABLE_CORS")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(defaults.enable_cors);
        let backend = std::env::var("HDIMS_BACKEND")
            .ok()
            .and_then(|v| Backend::from_str(&v))
            .unwrap_or(defaults.backend);

        Self {
            host,
            port,
            enable_cors,
            backend,
        }
    }

    /// Socket address to listen on
    pub fn bind_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_addr() {
        let config = ApiConfig {
            host: "127.0.0.1".into(),
            port: 8088,
            ..Default::default()
        };
        assert_eq!(config.bind_addr().unwrap().port(), 8088);

        let config = ApiConfig {
            host: "not a host".into(),
            ..Default::default()
        };
        assert!(config.bind_addr().is_err());
    }

    #[test]
    fn test_config_default() {
        let config = ApiConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert!(config.enable_cors);
        assert_eq!(config.backend, Backend::Memory);
    }
}
