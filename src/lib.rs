//! Vertica MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools that let AI
//! assistants explore a Vertica database read-only: guarded queries, catalog
//! listings, projections, query plans, sample queries and result export.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::VerticaService;
