//! HTTP client for a running functions server

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::{CliError, CliResult};

/// Prefix every function is mounted under
const FUNCTIONS_PREFIX: &str = "/functions/v1";

/// Health as reported by `/functions/v1/health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub backend: String,
}

/// Functions client
pub struct HdimsClient {
    client: Client,
    base_url: String,
}

impl HdimsClient {
    /// Create a new client
    pub fn new(base_url: &str) -> CliResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CliError::connection(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, function: &str) -> String {
        format!("{}{}/{}", self.base_url, FUNCTIONS_PREFIX, function)
    }

    /// Check API health
    pub async fn health(&self) -> CliResult<HealthStatus> {
        let response = self
            .client
            .get(self.url("health"))
            .send()
            .await
            .map_err(|e| CliError::connection(format!("{}: {}", self.base_url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CliError::api(status.as_u16(), envelope_message(&body)));
        }

        let envelope: Value = response.json().await?;
        let data = envelope.get("data").cloned().unwrap_or(envelope);
        Ok(serde_json::from_value(data)?)
    }
}

/// `error` or `message` from a response envelope, else the raw body
fn envelope_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error", "message"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}
