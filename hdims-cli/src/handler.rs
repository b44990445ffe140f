//! Command handlers

use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use hdims_api::{run_server, ApiConfig};
use hdims_core::validation::{
    validate_analytics_payload, validate_performance_payload, validate_review_payload,
    validate_scheme_payload,
};
use hdims_core::Role;
use hdims_db::{import, Backend, MemoryPlatform, NewUser, Platform, PlatformClient, PlatformConfig};

use crate::client::HdimsClient;
use crate::commands::{Cli, Commands, OutputFormat, ValidateTarget};
use crate::error::{CliError, CliResult};
use crate::output::print_output;

/// Super admin created on a fresh memory backend
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
}

/// Outcome of `hdims validate`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub target: &'static str,
    pub valid: bool,
    pub error: Option<String>,
    /// Normalized payload when valid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> CliResult<()> {
    let backend = Backend::from_str(&cli.backend)
        .ok_or_else(|| CliError::invalid_arg(format!("Unknown backend: {}", cli.backend)))?;

    match cli.command {
        Commands::Serve {
            host,
            port,
            no_cors,
            admin_email,
            admin_password,
        } => {
            let seed = match (admin_email, admin_password) {
                (Some(email), Some(password)) => Some(AdminSeed { email, password }),
                (None, None) => None,
                _ => {
                    return Err(CliError::invalid_arg(
                        "--admin-email and --admin-password must be given together",
                    ))
                }
            };
            let platform = build_platform(backend, seed).await?;
            let config = ApiConfig {
                host,
                port,
                enable_cors: !no_cors,
                backend,
            };
            run_server(config, platform)
                .await
                .map_err(|e| CliError::server(e.to_string()))
        }

        Commands::Import { kind, file } => {
            if backend == Backend::Memory {
                warn!("Importing into the memory backend; rows are discarded on exit");
            }
            let platform = build_platform(backend, None).await?;
            let report = import::import_file(&*platform.store, kind.into(), &file).await?;
            match cli.format {
                OutputFormat::Json => print_output(&report, cli.format)?,
                _ => report.print_summary(),
            }
            if report.inserted == 0 && report.total > 0 {
                return Err(CliError::Rejected(format!(
                    "none of the {} rows in {} were imported",
                    report.total,
                    file.display()
                )));
            }
            Ok(())
        }

        Commands::Validate { target, file } => {
            let report = validate_file(target, &file).await?;
            print_output(&report, cli.format)?;
            match report.error {
                Some(error) => Err(CliError::Rejected(error)),
                None => Ok(()),
            }
        }

        Commands::Health => {
            let client = HdimsClient::new(&cli.api_url)?;
            let health = client.health().await?;
            print_output(&health, cli.format)
        }
    }
}

/// Platform handle for the chosen backend
pub async fn build_platform(backend: Backend, seed: Option<AdminSeed>) -> CliResult<Platform> {
    match backend {
        Backend::Memory => {
            let memory = MemoryPlatform::new();
            if let Some(seed) = seed {
                let profile = memory
                    .create_user(
                        NewUser::new(seed.email, seed.password, Role::SuperAdmin)
                            .full_name("Administrator"),
                    )
                    .await?;
                info!(user = %profile.id, email = %profile.email, "Super admin created");
            }
            Ok(memory.platform())
        }
        Backend::Remote => {
            if seed.is_some() {
                warn!("Admin seeding only applies to the memory backend; ignored");
            }
            let config = PlatformConfig::from_env()?;
            info!(url = %config.base_url(), "Using hosted platform");
            Ok(PlatformClient::new(config)?.platform())
        }
    }
}

/// Run the boundary checks for `target` over a JSON file
pub async fn validate_file(target: ValidateTarget, path: &Path) -> CliResult<ValidationReport> {
    let text = tokio::fs::read_to_string(path).await?;
    let value: Value = serde_json::from_str(&text)?;

    let result = match target {
        ValidateTarget::Performance => normalized(validate_performance_payload(&value)),
        ValidateTarget::Scheme => normalized(validate_scheme_payload(&value)),
        ValidateTarget::Review => normalized(validate_review_payload(&value)),
        ValidateTarget::Analytics => normalized(validate_analytics_payload(&value)),
    };

    Ok(match result {
        Ok(payload) => ValidationReport {
            target: target.as_str(),
            valid: true,
            error: None,
            payload: Some(payload),
        },
        Err(error) => ValidationReport {
            target: target.as_str(),
            valid: false,
            error: Some(error),
            payload: None,
        },
    })
}

fn normalized<T: Serialize, E: std::fmt::Display>(result: Result<T, E>) -> Result<Value, String> {
    let parsed = result.map_err(|e| e.to_string())?;
    serde_json::to_value(parsed).map_err(|e| e.to_string())
}
