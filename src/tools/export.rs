//! Result export tool.
//!
//! Implements `export_query_results`. A statement without its own LIMIT is
//! sent with `LIMIT max_rows + 1` so the server stops early; the extra row only
//! marks the output as truncated.

use crate::db::QueryBackend;
use crate::error::DbResult;
use crate::tools::format::{self, ExportFormat};
use crate::tools::sql_guard::SqlGuard;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Input for the export_query_results tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExportInput {
    /// SQL SELECT statement whose results are exported
    pub sql: String,
    /// "json" (default) or "csv"
    #[serde(default)]
    pub format: ExportFormat,
}

/// Output from the export_query_results tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExportOutput {
    pub format: ExportFormat,
    /// Serialized rows: a JSON array of objects, or CSV text
    pub data: String,
    pub row_count: usize,
    /// True if the result had more rows than the export maximum
    pub truncated: bool,
    pub max_rows: u32,
    pub execution_time_ms: u64,
}

/// Handler for result export.
pub struct ExportToolHandler {
    backend: Arc<dyn QueryBackend>,
    guard: Arc<SqlGuard>,
    max_rows: u32,
}

impl ExportToolHandler {
    pub fn new(backend: Arc<dyn QueryBackend>, guard: Arc<SqlGuard>, max_rows: u32) -> Self {
        Self {
            backend,
            guard,
            max_rows: max_rows.max(1),
        }
    }

    pub async fn export(&self, input: ExportInput) -> DbResult<ExportOutput> {
        let guarded = self.guard.validate(&input.sql)?;
        let sql = guarded.with_limit(self.max_rows.saturating_add(1));
        let mut result = self.backend.fetch(&sql, self.max_rows as usize).await?;
        result.cap_rows(self.max_rows as usize);

        if result.truncated {
            warn!(max_rows = self.max_rows, "Export truncated");
        }
        let data = format::render(&result, input.format)?;

        info!(
            format = %input.format,
            rows = result.row_count(),
            truncated = result.truncated,
            "Exported query results"
        );
        Ok(ExportOutput {
            format: input.format,
            data,
            row_count: result.row_count(),
            truncated: result.truncated,
            max_rows: self.max_rows,
            execution_time_ms: result.execution_time_ms,
        })
    }
}
