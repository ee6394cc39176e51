//! Parcelwise MCP (Model Context Protocol) Server
//!
//! This crate lets AI agents quote and book deliveries through five tools
//! served over stdio:
//!
//! - `create_estimate` / `create_order`: booking service calls
//! - `compare_pricing_models`: all discount models against one estimate option
//! - `select_delivery_option`: fastest or cheapest option from an estimate
//! - `conversational_pricing_advisor`: one turn of the conversation engine
//!
//! ## Architecture
//!
//! - `ParcelwiseMcpServer`: rmcp tool router and `ServerHandler`
//! - `tools`: argument validation and tool logic, independent of the transport
//!
//! ## Example Usage
//!
//! ```no_run
//! use parcelwise_core::config::{AppConfig, LoadOptions};
//! use parcelwise_mcp::ParcelwiseMcpServer;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load(LoadOptions::default())?;
//!     ParcelwiseMcpServer::from_config(&config)?.run_stdio().await
//! }
//! ```

mod server;
pub mod tools;

pub use server::ParcelwiseMcpServer;
pub use tools::{ToolService, ALL_TOOL_NAMES};

use thiserror::Error;

/// A failed tool call. The display text is what the caller sees.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    Invalid(String),

    #[error("failed to parse {field}: {source}")]
    Parse {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Upstream(String),

    #[error("failed to encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Invalid(_) => "invalid_arguments",
            ToolError::Parse { .. } => "parse_failure",
            ToolError::Upstream(_) => "upstream_failure",
            ToolError::Encode(_) => "encode_failure",
        }
    }
}
