//! Name-keyed tables of the tools, resources and prompts a session serves.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use super::context::ToolContext;
use super::protocol::{
    GetPromptResult, McpError, PromptArgument, PromptDefinition, ResourceContent,
    ResourceDefinition, ToolDefinition, ToolsCallResult,
};

type HandlerFuture<T> = Pin<Box<dyn Future<Output = Result<T, McpError>> + Send>>;

pub type ToolResult = Result<ToolsCallResult, McpError>;
pub type ResourceResult = Result<Vec<ResourceContent>, McpError>;

type ToolHandler =
    Arc<dyn Fn(ToolContext, Value) -> HandlerFuture<ToolsCallResult> + Send + Sync>;
type ResourceHandler =
    Arc<dyn Fn(ToolContext) -> HandlerFuture<Vec<ResourceContent>> + Send + Sync>;

/// Prompts are static text templates filled from their string arguments.
pub type PromptRenderer = fn(&HashMap<String, String>) -> GetPromptResult;

pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub handler: ToolHandler,
}

pub struct RegisteredResource {
    pub definition: ResourceDefinition,
    pub handler: ResourceHandler,
}

impl RegisteredResource {
    /// A JSON resource served at exactly `uri`.
    pub fn json<F, Fut>(uri: &str, name: &str, description: &str, handler: F) -> Self
    where
        F: Fn(ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ResourceResult> + Send + 'static,
    {
        Self {
            definition: ResourceDefinition {
                uri: uri.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                mime_type: "application/json",
            },
            handler: Arc::new(move |ctx| Box::pin(handler(ctx))),
        }
    }
}

pub struct RegisteredPrompt {
    pub definition: PromptDefinition,
    pub render: PromptRenderer,
}

impl RegisteredPrompt {
    pub fn new(
        name: &str,
        description: &str,
        arguments: Vec<PromptArgument>,
        render: PromptRenderer,
    ) -> Self {
        Self {
            definition: PromptDefinition {
                name: name.to_string(),
                description: description.to_string(),
                arguments,
            },
            render,
        }
    }
}

#[derive(Default)]
pub struct McpRegistry {
    tools: BTreeMap<String, RegisteredTool>,
    resources: BTreeMap<String, RegisteredResource>,
    prompts: BTreeMap<String, RegisteredPrompt>,
}

impl McpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every tool, resource and prompt the server offers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        super::tools::register_all_tools(&mut registry);
        super::resources::register_all_resources(&mut registry);
        super::prompts::register_all_prompts(&mut registry);
        registry
    }

    pub fn register_tool(&mut self, tool: RegisteredTool) {
        self.tools.insert(tool.definition.name.clone(), tool);
    }

    pub fn register_resource(&mut self, resource: RegisteredResource) {
        self.resources
            .insert(resource.definition.uri.clone(), resource);
    }

    pub fn register_prompt(&mut self, prompt: RegisteredPrompt) {
        self.prompts.insert(prompt.definition.name.clone(), prompt);
    }

    /// Tool definitions, sorted by name.
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition.clone()).collect()
    }

    pub fn resource_definitions(&self) -> Vec<ResourceDefinition> {
        self.resources.values().map(|r| r.definition.clone()).collect()
    }

    pub fn prompt_definitions(&self) -> Vec<PromptDefinition> {
        self.prompts.values().map(|p| p.definition.clone()).collect()
    }

    pub fn get_tool(&self, name: &str) -> Option<&RegisteredTool> {
        self.tools.get(name)
    }

    pub fn find_resource(&self, uri: &str) -> Option<&RegisteredResource> {
        self.resources.get(uri)
    }

    pub fn get_prompt(&self, name: &str) -> Option<&RegisteredPrompt> {
        self.prompts.get(name)
    }

    pub fn tool_count(&self) -> usize {
        self.tools.len()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn prompt_count(&self) -> usize {
        self.prompts.len()
    }
}

/// Builder for registering a tool
pub struct ToolBuilder {
    name: String,
    description: String,
    input_schema: Value,
}

impl ToolBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            input_schema: serde_json::json!({ "type": "object", "properties": {} }),
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn build<F, Fut>(self, handler: F) -> RegisteredTool
    where
        F: Fn(ToolContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        RegisteredTool {
            definition: ToolDefinition {
                name: self.name,
                description: self.description,
                input_schema: self.input_schema,
            },
            handler: Arc::new(move |ctx, params| Box::pin(handler(ctx, params))),
        }
    }
}
