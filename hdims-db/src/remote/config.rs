//! Hosted platform connection settings

use serde::{Deserialize, Serialize};
use std::env;

use crate::error::{DbError, DbResult};

/// Default HTTP timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default document bucket
pub const DEFAULT_BUCKET: &str = "documents";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Project URL, e.g. `https://xyz.example.co`
    pub url: String,
    /// Service or anon key
    pub api_key: String,
    /// Bucket for uploaded documents
    pub bucket: String,
    pub timeout_secs: u64,
}

impl PlatformConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            bucket: DEFAULT_BUCKET.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Load from environment variables
    ///
    /// - `HDIMS_PLATFORM_URL` (required)
    /// - `HDIMS_PLATFORM_KEY` (required)
    /// - `HDIMS_STORAGE_BUCKET` (default `documents`)
    /// - `HDIMS_HTTP_TIMEOUT_SECS` (default 30)
    pub fn from_env() -> DbResult<Self> {
        let url = env::var("HDIMS_PLATFORM_URL")
            .map_err(|_| DbError::Config("HDIMS_PLATFORM_URL is not set".to_string()))?;
        let api_key = env::var("HDIMS_PLATFORM_KEY")
            .map_err(|_| DbError::Config("HDIMS_PLATFORM_KEY is not set".to_string()))?;

        let mut config = Self::new(url, api_key);
        if let Ok(bucket) = env::var("HDIMS_STORAGE_BUCKET") {
            config.bucket = bucket;
        }
        if let Ok(timeout) = env::var("HDIMS_HTTP_TIMEOUT_SECS") {
            config.timeout_secs = timeout.parse().map_err(|_| {
                DbError::Config(format!("Invalid HDIMS_HTTP_TIMEOUT_SECS: {}", timeout))
            })?;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn validate(&self) -> DbResult<()> {
        if !(self.url.starts_with("http://") || self.url.starts_with("https://")) {
            return Err(DbError::Config(format!(
                "Platform URL must start with http:// or https://: {}",
                self.url
            )));
        }
        if self.api_key.trim().is_empty() {
            return Err(DbError::Config("Platform key is empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(DbError::Config("HTTP timeout must be positive".to_string()));
        }
        Ok(())
    }

    /// URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}
