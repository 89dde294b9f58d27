//! Query execution tool.
//!
//! This module implements the `execute_query` MCP tool. Statements pass the
//! [`SqlGuard`] first; anything other than SELECT, DESCRIBE or EXPLAIN is
//! rejected before it reaches the database.

use crate::db::QueryBackend;
use crate::error::DbResult;
use crate::models::{ColumnMetadata, MAX_ROW_LIMIT, QueryResult};
use crate::tools::sql_guard::SqlGuard;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Input for the execute_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteQueryInput {
    /// SQL SELECT, DESCRIBE or EXPLAIN statement. Write operations and DDL are blocked.
    pub sql: String,
    /// Maximum rows to return. Defaults to the server's QUERY_LIMIT_SIZE, max: 10000
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Output from the execute_query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExecuteQueryOutput {
    pub columns: Vec<ColumnMetadata>,
    /// Result rows as column name to value maps
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub row_count: usize,
    /// True if more rows were available than the limit
    pub truncated: bool,
    pub execution_time_ms: u64,
    /// The statement sent to the database
    pub query: String,
}

impl ExecuteQueryOutput {
    pub fn from_result(result: QueryResult, query: String) -> Self {
        Self {
            rows: result.row_maps(),
            row_count: result.row_count(),
            truncated: result.truncated,
            execution_time_ms: result.execution_time_ms,
            columns: result.columns,
            query,
        }
    }
}

/// Clamp a requested row limit to `[1, MAX_ROW_LIMIT]`.
pub fn effective_limit(requested: Option<u32>, default: u32) -> u32 {
    requested.unwrap_or(default).clamp(1, MAX_ROW_LIMIT)
}

/// Handler for query execution.
pub struct QueryToolHandler {
    backend: Arc<dyn QueryBackend>,
    guard: Arc<SqlGuard>,
}

impl QueryToolHandler {
    pub fn new(backend: Arc<dyn QueryBackend>, guard: Arc<SqlGuard>) -> Self {
        Self { backend, guard }
    }

    /// Guard, limit and run a statement.
    pub async fn execute_query(&self, input: ExecuteQueryInput) -> DbResult<ExecuteQueryOutput> {
        let limit = effective_limit(input.limit, self.guard.default_limit());
        let guarded = self.guard.validate(&input.sql)?;
        let sql = guarded.with_limit(limit);

        let result = self.backend.fetch(&sql, limit as usize).await?;

        info!(
            kind = ?guarded.kind,
            rows = result.row_count(),
            truncated = result.truncated,
            elapsed_ms = result.execution_time_ms,
            "Query executed"
        );
        Ok(ExecuteQueryOutput::from_result(result, sql))
    }
}
