//! MCP Server Implementation
//!
//! Exposes [`ToolService`] over the Model Context Protocol.

use std::sync::Arc;

use parcelwise_agent::ConversationEngine;
use parcelwise_core::config::AppConfig;
use rmcp::{
    handler::server::{tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use tracing::{debug, info, warn};

use crate::tools::{
    AdvisorArgs, ComparePricingArgs, CreateEstimateArgs, CreateOrderArgs, SelectDeliveryArgs,
    ToolService,
};
use crate::ToolError;

const INSTRUCTIONS: &str = "Parcelwise quotes and books local deliveries. \
Call create_estimate first, then select_delivery_option or compare_pricing_models on its result, \
and create_order once the customer confirms. Structured arguments are JSON-encoded strings. \
Use conversational_pricing_advisor to answer free-form pricing questions.";

/// Main MCP server for parcelwise
#[derive(Clone)]
pub struct ParcelwiseMcpServer {
    tools: Arc<ToolService>,
    tool_router: ToolRouter<Self>,
}

impl ParcelwiseMcpServer {
    pub fn new(tools: ToolService) -> Self {
        Self { tools: Arc::new(tools), tool_router: Self::tool_router() }
    }

    /// Builds the booking client and optional text-generation client from
    /// config. Fails when a live booking mode lacks credentials.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        info!(
            event_name = "mcp.server.initializing",
            correlation_id = "bootstrap",
            booking_mode = config.booking.effective_auth_mode().as_str(),
            "initializing parcelwise MCP server"
        );
        let engine = ConversationEngine::from_config(config)?;
        Ok(Self::new(ToolService::new(engine)))
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tool_router.list_all().into_iter().map(|tool| tool.name.to_string()).collect()
    }

    /// Run the server with stdio transport
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        use tokio::io::{stdin, stdout};

        info!(
            event_name = "mcp.server.started",
            correlation_id = "bootstrap",
            "starting MCP server with stdio transport"
        );

        let service = self.serve((stdin(), stdout())).await?;
        let quit_reason = service.waiting().await?;

        info!(
            event_name = "mcp.server.stopped",
            correlation_id = "shutdown",
            reason = ?quit_reason,
            "MCP server shutdown complete"
        );
        Ok(())
    }

    fn finish(tool: &str, outcome: Result<String, ToolError>) -> Result<CallToolResult, McpError> {
        match outcome {
            Ok(body) => {
                debug!(event_name = "mcp.tool.completed", correlation_id = tool, "tool call completed");
                Ok(CallToolResult::success(vec![Content::text(body)]))
            }
            Err(error) => {
                warn!(
                    event_name = "mcp.tool.failed",
                    correlation_id = tool,
                    error_kind = error.kind(),
                    error = %error,
                    "tool call failed"
                );
                Ok(CallToolResult::error(vec![Content::text(error.to_string())]))
            }
        }
    }
}

#[tool_router]
impl ParcelwiseMcpServer {
    #[tool(description = "Create a cost estimate for a delivery or service order")]
    async fn create_estimate(
        &self,
        params: Parameters<CreateEstimateArgs>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = self.tools.create_estimate(&params.0).await;
        Self::finish("create_estimate", outcome)
    }

    #[tool(description = "Create a new order for delivery or service")]
    async fn create_order(
        &self,
        params: Parameters<CreateOrderArgs>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = self.tools.create_order(&params.0).await;
        Self::finish("create_order", outcome)
    }

    #[tool(
        description = "Compare different pricing models (multi-delivery, volume discounts, etc.) against an existing estimate"
    )]
    async fn compare_pricing_models(
        &self,
        params: Parameters<ComparePricingArgs>,
    ) -> Result<CallToolResult, McpError> {
        Self::finish("compare_pricing_models", self.tools.compare_pricing_models(&params.0))
    }

    #[tool(
        description = "Select the fastest or cheapest delivery option from a create_estimate response"
    )]
    async fn select_delivery_option(
        &self,
        params: Parameters<SelectDeliveryArgs>,
    ) -> Result<CallToolResult, McpError> {
        Self::finish("select_delivery_option", self.tools.select_delivery_option(&params.0))
    }

    #[tool(description = "Get personalized pricing advice through natural conversation")]
    async fn conversational_pricing_advisor(
        &self,
        params: Parameters<AdvisorArgs>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = self.tools.conversational_pricing_advisor(&params.0).await;
        Self::finish("conversational_pricing_advisor", outcome)
    }
}

#[tool_handler]
impl ServerHandler for ParcelwiseMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "parcelwise-mcp".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                title: None,
                icons: None,
                website_url: None,
            },
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(INSTRUCTIONS.to_string()),
            ..Default::default()
        }
    }
}
