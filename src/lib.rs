//! Choreography Server Library
//!
//! Builds ordered cycling-class playlists from a tagged track catalog, the
//! feedback history of past classes, and (optionally) suggestions from an
//! OpenAI-compatible completion service.

pub mod assembler;
pub mod bootstrap;
pub mod catalog_store;
pub mod config;
pub mod feedback;
pub mod gap_fill;
pub mod identity;
pub mod llm;
pub mod mcp;
pub mod planner;
pub mod request;
pub mod selector;
pub mod sqlite_persistence;

// Re-export commonly used types for convenience
pub use assembler::{BuildError, PlaylistAssembler, Routine};
pub use catalog_store::{CatalogAccessor, SqliteCatalogStore};
pub use config::{AppConfig, CliConfig, FileConfig};
pub use gap_fill::{GapFiller, LlmGapFiller};
pub use request::PlaylistRequest;
