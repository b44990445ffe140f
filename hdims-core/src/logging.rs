//! Structured logging
//!
//! JSON output for deployments, pretty output for local development.
//! Configured from `HDIMS_LOG_LEVEL`, `HDIMS_LOG_FORMAT` and `RUST_LOG`.

use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty-printed for development
    #[default]
    Pretty,
    /// JSON for production
    Json,
    /// Compact single-line
    Compact,
}

impl LogFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Include source file/line
    pub include_source: bool,
    /// Explicit filter directive, overrides `level`
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            include_source: false,
            filter: None,
        }
    }
}

impl LogConfig {
    /// Load from environment variables
    ///
    /// Unknown values fall back to the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(level) = std::env::var("HDIMS_LOG_LEVEL")
            .ok()
            .and_then(|v| LogLevel::from_str(&v))
        {
            config.level = level;
        }
        if let Some(format) = std::env::var("HDIMS_LOG_FORMAT")
            .ok()
            .and_then(|v| LogFormat::from_str(&v))
        {
            config.format = format;
        }
        config.filter = std::env::var("RUST_LOG").ok().filter(|v| !v.trim().is_empty());
        config
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Filter directive handed to the subscriber
    pub fn directive(&self) -> String {
        match &self.filter {
            Some(f) => f.clone(),
            None => format!(
                "hdims_core={level},hdims_db={level},hdims_api={level},hdims_portal={level},hdims_cli={level},tower_http={level}",
                level = self.level
            ),
        }
    }
}

/// Install the global subscriber
pub fn init_logging(config: &LogConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_new(config.directive())?;

    match config.format {
        LogFormat::Json => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .json()
                    .with_file(config.include_source)
                    .with_line_number(config.include_source),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Pretty => {
            let subscriber = tracing_subscriber::registry().with(filter).with(
                fmt::layer()
                    .pretty()
                    .with_file(config.include_source)
                    .with_line_number(config.include_source),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogFormat::Compact => {
            let subscriber = tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().compact().with_target(true));
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parse() {
        assert_eq!(LogLevel::from_str("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("verbose"), None);
    }

    #[test]
    fn test_directive_uses_level() {
        let config = LogConfig::default().with_level(LogLevel::Debug);
        assert!(config.directive().contains("hdims_api=debug"));

        let config = LogConfig {
            filter: Some("warn".into()),
            ..Default::default()
        };
        assert_eq!(config.directive(), "warn");
    }
}
