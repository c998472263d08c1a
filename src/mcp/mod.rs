//! MCP (Model Context Protocol) server
//!
//! Exposes routine building, catalog queries and feedback recording as MCP
//! tools, plus a class-building prompt, to a client talking JSON-RPC over
//! stdin/stdout.

mod context;
mod handler;
mod prompts;
pub mod protocol;
mod registry;
pub mod resources;
pub mod tools;

pub use context::ToolContext;
pub use handler::McpServer;
pub use registry::McpRegistry;
