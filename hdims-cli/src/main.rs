//! HDIMS CLI entry point

use clap::Parser;
use hdims_cli::{handler, Cli};
use hdims_core::logging::{init_logging, LogConfig, LogLevel};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env();
    if cli.verbose {
        log_config = log_config.with_level(LogLevel::Debug);
    }
    if let Err(e) = init_logging(&log_config) {
        eprintln!("Warning: logging not initialized: {}", e);
    }

    if let Err(e) = handler::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
