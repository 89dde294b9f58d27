//! Database access layer.
//!
//! This module provides database access functionality:
//! - The `QueryBackend` seam used by every tool
//! - The Vertica connection pool
//! - Query execution and row decoding
//! - Catalog introspection

pub mod backend;
pub mod catalog;
pub mod executor;
pub mod pool;
pub mod types;

pub use backend::QueryBackend;
pub use catalog::CatalogInspector;
pub use pool::VerticaPool;
