//! Hosted platform HTTP client
//!
//! Talks to the managed platform's REST (`/rest/v1`), RPC (`/rest/v1/rpc`),
//! storage (`/storage/v1`) and auth (`/auth/v1`) endpoints.

mod config;

pub use config::PlatformConfig;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tracing::{debug, error};

use hdims_core::Collection;

use crate::error::{DbError, DbResult};
use crate::facade::{
    AuthEvent, AuthProvider, AuthSession, AuthUser, Caller, DataStore, ObjectStorage, Platform,
    Procedure, RpcBackend, UploadOptions,
};
use crate::query::{Query, Selection};

const EVENT_CAPACITY: usize = 64;

/// Client for the hosted platform
#[derive(Debug, Clone)]
pub struct PlatformClient {
    client: Client,
    config: PlatformConfig,
    events: broadcast::Sender<AuthEvent>,
}

impl PlatformClient {
    pub fn new(config: PlatformConfig) -> DbResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| DbError::Connection(e.to_string()))?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            client,
            config,
            events,
        })
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Trait-object handle using this client for every contract
    pub fn platform(self) -> Platform {
        let shared = Arc::new(self);
        Platform {
            store: shared.clone(),
            rpc: shared.clone(),
            storage: shared.clone(),
            auth: shared,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url(), path)
    }

    /// Request authorized with the service key
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_as(method, path, &self.config.api_key)
    }

    /// Request authorized with a user's access token
    fn request_as(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("apikey", &self.config.api_key)
            .bearer_auth(token)
    }

    /// Return the response, or its error message as [`DbError`]
    async fn check(response: Response) -> DbResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        error!(status = status.as_u16(), error = %message, "Platform request failed");
        Err(match status.as_u16() {
            401 | 403 => DbError::unauthorized(message),
            404 => DbError::not_found(message),
            409 => DbError::AlreadyExists(message),
            code => DbError::platform(code, message),
        })
    }

    async fn rows(response: Response) -> DbResult<Vec<Value>> {
        let body: Value = Self::check(response).await?.json().await?;
        Ok(match body {
            Value::Array(rows) => rows,
            Value::Null => Vec::new(),
            other => vec![other],
        })
    }
}

/// Message from a platform error body, falling back to the raw text
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error_description", "msg", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// Total from a `Content-Range` header such as `0-9/42` or `*/0`
pub(crate) fn content_range_total(header: &str) -> Option<usize> {
    header.rsplit('/').next()?.trim().parse().ok()
}

#[async_trait]
impl DataStore for PlatformClient {
    async fn select(&self, table: Collection, query: &Query) -> DbResult<Selection> {
        let method = if query.head { Method::HEAD } else { Method::GET };
        let response = self
            .request(method, &format!("/rest/v1/{}", table))
            .header("Prefer", "count=exact")
            .query(&query.to_rest_params())
            .send()
            .await?;
        let response = Self::check(response).await?;
        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(content_range_total);

        if query.head {
            return Ok(Selection {
                data: Vec::new(),
                count: total.unwrap_or(0),
            });
        }
        let data = Self::rows(response).await?;
        Ok(Selection {
            count: total.unwrap_or(data.len()),
            data,
        })
    }

    async fn insert(&self, table: Collection, row: Value) -> DbResult<Value> {
        let response = self
            .request(Method::POST, &format!("/rest/v1/{}", table))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await?;
        Self::rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DbError::platform(502, format!("insert into {} returned no row", table)))
    }

    async fn update(&self, table: Collection, patch: Value, query: &Query) -> DbResult<Vec<Value>> {
        query.require_filter("update")?;
        let response = self
            .request(Method::PATCH, &format!("/rest/v1/{}", table))
            .header("Prefer", "return=representation")
            .query(&query.to_rest_params())
            .json(&patch)
            .send()
            .await?;
        Self::rows(response).await
    }

    async fn delete(&self, table: Collection, query: &Query) -> DbResult<Vec<Value>> {
        query.require_filter("delete")?;
        let response = self
            .request(Method::DELETE, &format!("/rest/v1/{}", table))
            .header("Prefer", "return=representation")
            .query(&query.to_rest_params())
            .send()
            .await?;
        Self::rows(response).await
    }
}

#[async_trait]
impl RpcBackend for PlatformClient {
    async fn rpc(&self, caller: &Caller, procedure: Procedure, params: Value) -> DbResult<Value> {
        debug!(procedure = %procedure, caller = %caller.user_id, "RPC call");
        let response = self
            .request_as(
                Method::POST,
                &format!("/rest/v1/rpc/{}", procedure),
                &caller.access_token,
            )
            .json(&params)
            .send()
            .await?;
        let response = Self::check(response).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

#[async_trait]
impl ObjectStorage for PlatformClient {
    async fn upload(&self, path: &str, bytes: Vec<u8>, options: &UploadOptions) -> DbResult<String> {
        let path = path.trim_start_matches('/');
        let response = self
            .request(
                Method::POST,
                &format!("/storage/v1/object/{}/{}", self.config.bucket, path),
            )
            .header("content-type", &options.content_type)
            .header("cache-control", format!("max-age={}", options.cache_control))
            .header("x-upsert", options.upsert.to_string())
            .body(bytes)
            .send()
            .await?;
        Self::check(response).await?;
        debug!(path = %path, "Object uploaded");
        Ok(path.to_string())
    }

    fn public_url(&self, path: &str) -> String {
        self.url(&format!(
            "/storage/v1/object/public/{}/{}",
            self.config.bucket, path
        ))
    }

    async fn signed_url(&self, path: &str, expires_in_secs: u64) -> DbResult<String> {
        let response = self
            .request(
                Method::POST,
                &format!("/storage/v1/object/sign/{}/{}", self.config.bucket, path),
            )
            .json(&json!({ "expiresIn": expires_in_secs }))
            .send()
            .await?;
        let signed: SignedUrlResponse = Self::check(response).await?.json().await?;
        Ok(self.url(&format!("/storage/v1{}", signed.signed_url)))
    }

    async fn remove(&self, path: &str) -> DbResult<()> {
        let path = path.trim_start_matches('/');
        let response = self
            .request(
                Method::DELETE,
                &format!("/storage/v1/object/{}/{}", self.config.bucket, path),
            )
            .send()
            .await?;
        match Self::check(response).await {
            Ok(_) | Err(DbError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    user: AuthUser,
}

#[async_trait]
impl AuthProvider for PlatformClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> DbResult<AuthSession> {
        let response = self
            .request(Method::POST, "/auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let token: TokenResponse = Self::check(response)
            .await
            .map_err(|e| DbError::Auth(e.to_string()))?
            .json()
            .await?;
        let session = AuthSession {
            access_token: token.access_token,
            expires_at: Utc::now() + chrono::Duration::seconds(token.expires_in),
            user: token.user,
        };
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str) -> DbResult<AuthUser> {
        let response = self
            .request(Method::POST, "/auth/v1/signup")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let body: Value = Self::check(response).await?.json().await?;
        // the user is either the body itself or nested under "user"
        let user = body.get("user").cloned().unwrap_or(body);
        Ok(serde_json::from_value(user)?)
    }

    async fn get_session(&self, access_token: &str) -> DbResult<Option<AuthSession>> {
        match self.get_user(access_token).await {
            Ok(user) => Ok(Some(AuthSession {
                access_token: access_token.to_string(),
                // the platform does not echo the expiry back
                expires_at: Utc::now() + chrono::Duration::hours(1),
                user,
            })),
            Err(DbError::Unauthorized(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_user(&self, access_token: &str) -> DbResult<AuthUser> {
        let response = self
            .request_as(Method::GET, "/auth/v1/user", access_token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn sign_out(&self, access_token: &str) -> DbResult<()> {
        let user = self.get_user(access_token).await.ok();
        let response = self
            .request_as(Method::POST, "/auth/v1/logout", access_token)
            .send()
            .await?;
        Self::check(response).await?;
        if let Some(user) = user {
            let _ = self.events.send(AuthEvent::SignedOut { user_id: user.id });
        }
        Ok(())
    }

    fn on_auth_state_change(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_message_prefers_message_field() {
        assert_eq!(
            error_message(r#"{"code":"P0001","message":"Unauthorized: reviewer role required"}"#),
            "Unauthorized: reviewer role required"
        );
        assert_eq!(
            error_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(error_message("  gateway timeout "), "gateway timeout");
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(content_range_total("0-9/42"), Some(42));
        assert_eq!(content_range_total("*/0"), Some(0));
        assert_eq!(content_range_total("0-9/*"), None);
    }

    #[test]
    fn test_public_url() {
        let client = PlatformClient::new(PlatformConfig::new("https://abc.example.co/", "key"))
            .unwrap();
        assert_eq!(
            client.public_url("u/1-a.pdf"),
            "https://abc.example.co/storage/v1/object/public/documents/u/1-a.pdf"
        );
    }
}
