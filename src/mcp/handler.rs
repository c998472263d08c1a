//! MCP stdio handler
//!
//! Reads one JSON-RPC message per line and writes one response per line.
//! Stdout carries nothing but protocol frames.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use super::context::ToolContext;
use super::protocol::{
    initialize_result, InitializeParams, McpError, McpRequest, McpResponse, Method,
    PromptsGetParams, ResourcesReadParams, ToolsCallParams, JSONRPC_VERSION,
};
use super::registry::McpRegistry;

const SERVER_NAME: &str = "choreography-mcp";

/// One MCP session over a pair of byte streams.
pub struct McpServer {
    registry: Arc<McpRegistry>,
    ctx: ToolContext,
    initialized: bool,
}

impl McpServer {
    pub fn new(registry: Arc<McpRegistry>, ctx: ToolContext) -> Self {
        info!(
            tools = registry.tool_count(),
            resources = registry.resource_count(),
            prompts = registry.prompt_count(),
            "MCP registry ready"
        );
        Self {
            registry,
            ctx,
            initialized: false,
        }
    }

    /// Serve until the reader hits end of input or the client sends `shutdown`.
    pub async fn serve<R, W>(&mut self, reader: R, mut writer: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let shutdown = is_shutdown(line);
            if let Some(response) = self.handle_message(line).await {
                match serde_json::to_string(&response) {
                    Ok(json) => {
                        writer.write_all(json.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                        writer.flush().await?;
                    }
                    Err(e) => error!("Failed to serialize MCP response: {}", e),
                }
            }
            if shutdown {
                debug!("Client requested shutdown");
                break;
            }
        }
        debug!("MCP session closed");
        Ok(())
    }

    /// Handle a single MCP message. Notifications get no response.
    pub async fn handle_message(&mut self, text: &str) -> Option<McpResponse> {
        let request: McpRequest = match serde_json::from_str(text) {
            Ok(req) => req,
            Err(e) => {
                return Some(McpResponse::error(None, McpError::ParseError(e.to_string())));
            }
        };

        if request.jsonrpc != JSONRPC_VERSION {
            let error =
                McpError::InvalidRequest(format!("unsupported jsonrpc '{}'", request.jsonrpc));
            return Some(McpResponse::error(request.id, error));
        }
        if request.is_notification() {
            debug!(method = %request.method, "Ignoring notification");
            return None;
        }

        let result = self.dispatch(&request).await;
        Some(match result {
            Ok(value) => McpResponse::success(request.id, value),
            Err(error) => {
                warn!(method = %request.method, code = error.code(), "MCP request failed");
                McpResponse::error(request.id, error)
            }
        })
    }

    async fn dispatch(&mut self, request: &McpRequest) -> Result<Value, McpError> {
        let method = Method::parse(&request.method)
            .ok_or_else(|| McpError::MethodNotFound(request.method.clone()))?;
        if method.needs_session() && !self.initialized {
            return Err(McpError::InvalidRequest("Not initialized".to_string()));
        }

        match method {
            Method::Initialize => {
                let params: InitializeParams = request.params()?;
                info!(
                    client = params.client_name(),
                    protocol_version = params.protocol_version.as_deref().unwrap_or("unknown"),
                    "MCP client initialized"
                );
                self.initialized = true;
                Ok(initialize_result(SERVER_NAME, &self.ctx.server_version))
            }
            Method::Initialized | Method::Ping | Method::Shutdown => Ok(json!({})),
            Method::ToolsList => Ok(json!({ "tools": self.registry.tool_definitions() })),
            Method::ToolsCall => {
                let params: ToolsCallParams = request.params()?;
                let tool = self.registry.get_tool(&params.name).ok_or_else(|| {
                    McpError::MethodNotFound(format!("Unknown tool: {}", params.name))
                })?;
                debug!(tool = %params.name, "Calling tool");
                let arguments = params.arguments.unwrap_or_else(|| json!({}));
                to_value((tool.handler)(self.ctx.clone(), arguments).await?)
            }
            Method::ResourcesList => {
                Ok(json!({ "resources": self.registry.resource_definitions() }))
            }
            Method::ResourcesRead => {
                let params: ResourcesReadParams = request.params()?;
                let resource = self
                    .registry
                    .find_resource(&params.uri)
                    .ok_or_else(|| McpError::ResourceNotFound(params.uri.clone()))?;
                let contents = (resource.handler)(self.ctx.clone()).await?;
                Ok(json!({ "contents": contents }))
            }
            Method::PromptsList => Ok(json!({ "prompts": self.registry.prompt_definitions() })),
            Method::PromptsGet => {
                let params: PromptsGetParams = request.params()?;
                let prompt = self.registry.get_prompt(&params.name).ok_or_else(|| {
                    McpError::InvalidParams(format!("Unknown prompt: {}", params.name))
                })?;
                to_value((prompt.render)(&params.arguments))
            }
        }
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, McpError> {
    serde_json::to_value(value).map_err(|e| McpError::InternalError(e.to_string()))
}

fn is_shutdown(line: &str) -> bool {
    serde_json::from_str::<McpRequest>(line)
        .is_ok_and(|r| Method::parse(&r.method) == Some(Method::Shutdown))
}
