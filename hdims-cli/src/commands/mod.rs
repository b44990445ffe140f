//! CLI Commands Module

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use hdims_db::ImportKind;

/// HDIMS operator CLI
#[derive(Parser, Debug)]
#[command(name = "hdims")]
#[command(version)]
#[command(about = "Healthcare Data Information Management System")]
#[command(long_about = "Operator tool for HDIMS.\n\n\
    Serve the validation functions, bulk-import districts and facilities, \
    check submission payloads offline and probe a running server.")]
pub struct Cli {
    /// Functions base URL (env: HDIMS_API_URL)
    #[arg(short, long, env = "HDIMS_API_URL", default_value = "http://localhost:3000")]
    pub api_url: String,

    /// Platform backend: memory or remote (env: HDIMS_BACKEND)
    #[arg(long, env = "HDIMS_BACKEND", default_value = "memory")]
    pub backend: String,

    /// Output format (json, table, plain)
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    #[default]
    Table,
    Plain,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the functions server
    Serve {
        /// Host to bind to (env: HDIMS_API_HOST)
        #[arg(short = 'H', long, env = "HDIMS_API_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Port to listen on (env: HDIMS_API_PORT)
        #[arg(short, long, env = "HDIMS_API_PORT", default_value = "3000")]
        port: u16,

        /// Disable permissive CORS
        #[arg(long)]
        no_cors: bool,

        /// Super admin to create on the memory backend (env: HDIMS_ADMIN_EMAIL)
        #[arg(long, env = "HDIMS_ADMIN_EMAIL")]
        admin_email: Option<String>,

        /// Password for --admin-email (env: HDIMS_ADMIN_PASSWORD)
        #[arg(long, env = "HDIMS_ADMIN_PASSWORD", hide_env_values = true)]
        admin_password: Option<String>,
    },

    /// Bulk-import locations from CSV
    Import {
        #[arg(value_enum)]
        kind: ImportTarget,

        /// CSV file with a header row
        file: PathBuf,
    },

    /// Check a JSON payload the way the functions do
    Validate {
        #[arg(value_enum)]
        target: ValidateTarget,

        /// JSON file
        file: PathBuf,
    },

    /// Check health of a running server
    Health,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ImportTarget {
    /// Columns: name, state, code (optional)
    Districts,
    /// Columns: name, district, facility_type
    Facilities,
}

impl From<ImportTarget> for ImportKind {
    fn from(target: ImportTarget) -> Self {
        match target {
            ImportTarget::Districts => ImportKind::Districts,
            ImportTarget::Facilities => ImportKind::Facilities,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ValidateTarget {
    Performance,
    Scheme,
    Review,
    Analytics,
}

impl ValidateTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidateTarget::Performance => "performance",
            ValidateTarget::Scheme => "scheme",
            ValidateTarget::Review => "review",
            ValidateTarget::Analytics => "analytics",
        }
    }
}
