//! Parcelwise MCP Server Binary
//!
//! ## Usage
//!
//! ```bash
//! # Offline demo data, no credentials needed
//! parcelwise-mcp
//!
//! # Explicit config file
//! PARCELWISE_CONFIG=config/parcelwise.toml parcelwise-mcp
//!
//! # Live booking service with a static token
//! DISPATCH_AUTH_TOKEN=... DISPATCH_GRAPHQL_ENDPOINT=https://... parcelwise-mcp
//! ```
//!
//! stdout carries the JSON-RPC stream, so all logs go to stderr.

use std::path::PathBuf;

use anyhow::Result;
use parcelwise_core::config::{AppConfig, LoadOptions, LogFormat};
use parcelwise_mcp::ParcelwiseMcpServer;
use tracing::Level;

fn init_logging(config: &AppConfig) {
    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_ansi(false)
        .with_writer(std::io::stderr);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var_os("PARCELWISE_CONFIG").map(PathBuf::from);
    let require_file = config_path.is_some();
    let config = AppConfig::load(LoadOptions { config_path, require_file, ..LoadOptions::default() })?;
    init_logging(&config);

    let server = ParcelwiseMcpServer::from_config(&config)?;
    server.run_stdio().await
}
