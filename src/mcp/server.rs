//! Lab Stock MCP Server Implementation
//!
//! Implements the MCP server with all Lab Stock tools.

use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::{schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::db::Database;
use crate::stock::{StockOptions, UnitFamilies};
use crate::tools::status::StatusTracker;
use crate::tools::stock;

/// Lab Stock MCP Service
#[derive(Clone)]
pub struct LabStockService {
    status_tracker: Arc<Mutex<StatusTracker>>,
    database: Database,
    families: Arc<UnitFamilies>,
    config: Arc<Config>,
    tool_router: ToolRouter<LabStockService>,
}

impl LabStockService {
    pub fn new(config: Config, database: Database, families: UnitFamilies) -> Self {
        let reference_units = families
            .reference_axes()
            .iter()
            .map(|u| u.label.clone())
            .collect();

        Self {
            status_tracker: Arc::new(Mutex::new(StatusTracker::new(&config, reference_units))),
            database,
            families: Arc::new(families),
            config: Arc::new(config),
            tool_router: Self::tool_router(),
        }
    }
}

// ============================================================================
// Parameter Structs
// ============================================================================

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ComputeProductStockParams {
    /// Product to report stock for
    pub product_id: i64,
    /// Person whose entity permissions decide which store locations are visible
    pub person_id: i64,
    /// Override the configured depth bound of the store location tree
    pub max_depth: Option<usize>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct ListVisibleRootsParams {
    pub person_id: i64,
}

// ============================================================================
// Tool Router
// ============================================================================

#[tool_router]
impl LabStockService {
    // --- Status ---

    #[tool(description = "Get the current status of the Lab Stock service including build info, database status, stock limits, and process information")]
    async fn labstock_status(&self) -> Result<CallToolResult, McpError> {
        let tracker = self.status_tracker.lock().await;
        let status = tracker.get_status();
        let json = serde_json::to_string_pretty(&status)
            .map_err(|e| McpError::internal_error(format!("Serialization error: {}", e), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get instructions for reading stock reports. Call this before interpreting current/total values or unit columns.")]
    fn stock_instructions(&self) -> Result<CallToolResult, McpError> {
        use crate::tools::status::STOCK_INSTRUCTIONS;
        Ok(CallToolResult::success(vec![Content::text(STOCK_INSTRUCTIONS)]))
    }

    // --- Stock ---

    #[tool(description = "Compute the stock of a product at every store location visible to a person. Each location lists current and cumulative (sub-tree) totals per reference unit, then unitless and consumable counts.")]
    async fn compute_product_stock(&self, Parameters(p): Parameters<ComputeProductStockParams>) -> Result<CallToolResult, McpError> {
        let mut options = StockOptions::from(self.config.as_ref());
        if let Some(max_depth) = p.max_depth {
            options.max_depth = max_depth;
        }

        let result = stock::compute_product_stock(&self.database, Arc::clone(&self.families), options, p.product_id, p.person_id)
            .await
            .map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(response) => serde_json::to_string_pretty(&response),
            None => Ok(format!(r#"{{"error": "Product not found", "id": {}}}"#, p.product_id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Units ---

    #[tool(description = "List the reference units (one per quantity family, e.g. L, g, m) stock is totalled against, with the units converted into each")]
    fn list_reference_units(&self) -> Result<CallToolResult, McpError> {
        let result = stock::list_reference_units(&self.database, &self.families).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "List every unit with its type, parent, and conversion factor to its reference unit")]
    fn list_units(&self) -> Result<CallToolResult, McpError> {
        let result = stock::list_units(&self.database, &self.families).map_err(|e| McpError::internal_error(e, None))?;
        let json = serde_json::to_string_pretty(&result).map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    // --- Visibility ---

    #[tool(description = "List the entities a person may read and their root store locations")]
    fn list_visible_roots(&self, Parameters(p): Parameters<ListVisibleRootsParams>) -> Result<CallToolResult, McpError> {
        let result = stock::list_visible_roots(&self.database, p.person_id).map_err(|e| McpError::internal_error(e, None))?;
        let json = match result {
            Some(roots) => serde_json::to_string_pretty(&roots),
            None => Ok(format!(r#"{{"error": "Person not found", "id": {}}}"#, p.person_id)),
        }.map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }
}

// ============================================================================
// Server Handler
// ============================================================================

#[tool_handler]
impl ServerHandler for LabStockService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "labstock".into(),
                version: crate::build_info::VERSION.into(),
                title: Some("Lab Stock".into()),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Lab Stock - chemical inventory stock per store location. \
                 IMPORTANT: Call stock_instructions before interpreting a stock report. \
                 Stock: compute_product_stock (product_id, person_id). \
                 Units: list_reference_units, list_units. \
                 Visibility: list_visible_roots. \
                 Status: labstock_status."
                    .into(),
            ),
        }
    }
}
