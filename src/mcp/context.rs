//! MCP Tool Execution Context
//!
//! Provides access to server state for tool implementations.

use std::sync::Arc;

use crate::assembler::{on_catalog, PlaylistAssembler};
use crate::catalog_store::CatalogAccessor;
use crate::mcp::protocol::McpError;

/// Context provided to tool and resource handlers during execution
#[derive(Clone)]
pub struct ToolContext {
    /// Builds routines; also owns the engine settings.
    pub assembler: Arc<PlaylistAssembler>,

    /// Access to catalog data
    pub catalog: Arc<dyn CatalogAccessor>,

    /// Server version info
    pub server_version: String,
}

impl ToolContext {
    pub fn new(assembler: Arc<PlaylistAssembler>) -> Self {
        Self {
            catalog: assembler.catalog().clone(),
            assembler,
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Run a catalog query on the blocking pool. Store failures become
    /// tool execution errors.
    pub async fn query<T, F>(&self, query: F) -> Result<T, McpError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn CatalogAccessor) -> anyhow::Result<T> + Send + 'static,
    {
        on_catalog(&self.catalog, query)
            .await
            .map_err(|e| McpError::ToolExecutionFailed(format!("{:#}", e)))
    }
}
