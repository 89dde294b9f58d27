//! Data models for the Vertica MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod connection;
pub mod query;
pub mod schema;
pub mod whitelist;

// Re-export commonly used types
pub use connection::{ConnectionParams, ConnectionParamsError, DEFAULT_VERTICA_PORT};
pub use query::{
    ColumnMetadata, DEFAULT_EXPORT_LIMIT, DEFAULT_ROW_LIMIT, MAX_ROW_LIMIT, QueryResult, Record,
};
pub use schema::{
    ColumnInfo, ProjectionInfo, SampleQuery, TableInfo, TableType, TypeFamily, ViewInfo,
};
pub use whitelist::Whitelist;
