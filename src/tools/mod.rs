//! MCP tool implementations.
//!
//! This module contains all Vertica tool handlers:
//! - `query`: Execute guarded SELECT/DESCRIBE/EXPLAIN statements
//! - `schema`: List tables, views and projections; describe a table
//! - `explain`: Retrieve a query plan
//! - `samples`: Generate exploration queries for a table
//! - `export`: Export results as JSON or CSV
//! - `sql_guard`: Read-only enforcement, whitelists and row limits

pub mod explain;
pub mod export;
pub mod format;
pub mod query;
pub mod samples;
pub mod schema;
pub mod sql_guard;

pub use explain::{ExplainInput, ExplainOutput, ExplainToolHandler};
pub use export::{ExportInput, ExportOutput, ExportToolHandler};
pub use format::ExportFormat;
pub use query::{ExecuteQueryInput, ExecuteQueryOutput, QueryToolHandler};
pub use samples::{SampleQueriesInput, SampleQueriesOutput, SampleQueryToolHandler};
pub use schema::{
    DescribeTableInput, DescribeTableOutput, ListProjectionsInput, ListProjectionsOutput,
    ListTablesInput, ListTablesOutput, ListViewsInput, ListViewsOutput, SchemaFilterInput,
    SchemaToolHandler,
};
pub use sql_guard::{GuardedQuery, SqlGuard, StatementKind};
