//! MCP server integration module.
//!
//! Glue between the MCP protocol (rmcp) and the Vertica tool handlers.

pub mod resources;
pub mod service;

pub use service::VerticaService;
