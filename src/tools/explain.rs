//! Query execution plan tool.
//!
//! This module implements the `explain_query` MCP tool. The statement is
//! guarded like any other query but no limit is appended, and the plan text is
//! returned exactly as Vertica prints it.

use crate::db::QueryBackend;
use crate::error::{DbError, DbResult};
use crate::tools::sql_guard::{SqlGuard, StatementKind};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Upper bound on plan rows read back.
pub const MAX_PLAN_ROWS: usize = 10_000;

/// Input for the explain_query tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExplainInput {
    /// SELECT statement to explain. A leading EXPLAIN is accepted and not repeated.
    pub sql: String,
}

/// Output from the explain_query tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExplainOutput {
    /// Plan text as returned by Vertica
    pub plan: String,
    /// One entry per plan row
    pub plan_lines: Vec<String>,
    /// The EXPLAIN statement that was run
    pub query: String,
    pub execution_time_ms: u64,
}

/// Handler for the explain tool.
pub struct ExplainToolHandler {
    backend: Arc<dyn QueryBackend>,
    guard: Arc<SqlGuard>,
}

impl ExplainToolHandler {
    pub fn new(backend: Arc<dyn QueryBackend>, guard: Arc<SqlGuard>) -> Self {
        Self { backend, guard }
    }

    /// Build the EXPLAIN statement for already-guarded SQL.
    pub fn explain_sql(sql: &str, kind: StatementKind) -> DbResult<String> {
        match kind {
            StatementKind::Explain => Ok(sql.to_string()),
            StatementKind::Select => Ok(format!("EXPLAIN {sql}")),
            StatementKind::Describe => Err(DbError::invalid_input(
                "DESCRIBE has no query plan; pass a SELECT statement",
            )),
        }
    }

    pub async fn explain(&self, input: ExplainInput) -> DbResult<ExplainOutput> {
        let guarded = self.guard.validate(&input.sql)?;
        let sql = Self::explain_sql(&guarded.sql, guarded.kind)?;

        let result = self.backend.fetch(&sql, MAX_PLAN_ROWS).await?;
        let plan_lines: Vec<String> = result
            .rows
            .iter()
            .filter_map(|row| row.first())
            .map(plan_text)
            .collect();

        info!(lines = plan_lines.len(), "Explained query");
        Ok(ExplainOutput {
            plan: plan_lines.join("\n"),
            plan_lines,
            query: sql,
            execution_time_ms: result.execution_time_ms,
        })
    }
}

fn plan_text(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explain_prefix_added_once() {
        assert_eq!(
            ExplainToolHandler::explain_sql("SELECT 1", StatementKind::Select).unwrap(),
            "EXPLAIN SELECT 1"
        );
        assert_eq!(
            ExplainToolHandler::explain_sql("EXPLAIN SELECT 1", StatementKind::Explain).unwrap(),
            "EXPLAIN SELECT 1"
        );
    }

    #[test]
    fn test_describe_has_no_plan() {
        let err =
            ExplainToolHandler::explain_sql("DESCRIBE employees", StatementKind::Describe)
                .unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_plan_text_keeps_strings_verbatim() {
        let line = " +-STORAGE ACCESS for t [Cost: 1, Rows: 2]";
        assert_eq!(plan_text(&JsonValue::String(line.into())), line);
        assert_eq!(plan_text(&JsonValue::Null), "");
    }
}
