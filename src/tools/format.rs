//! Result serialization for export.
//!
//! Shared output format type and the CSV/JSON renderers used by
//! `export_query_results`.

use crate::error::{DbError, DbResult};
use crate::models::QueryResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Export format for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Array of row objects (default)
    #[default]
    Json,
    /// Header line plus one line per row
    Csv,
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Render a result set in the requested format.
pub fn render(result: &QueryResult, format: ExportFormat) -> DbResult<String> {
    match format {
        ExportFormat::Json => format_as_json(result),
        ExportFormat::Csv => Ok(format_as_csv(result)),
    }
}

pub fn format_as_json(result: &QueryResult) -> DbResult<String> {
    serde_json::to_string_pretty(&result.row_maps())
        .map_err(|e| DbError::internal(format!("Failed to serialize rows: {e}")))
}

pub fn format_as_csv(result: &QueryResult) -> String {
    let mut lines = Vec::with_capacity(result.rows.len() + 1);
    lines.push(
        result
            .columns
            .iter()
            .map(|c| csv_field(&c.name))
            .collect::<Vec<_>>()
            .join(","),
    );
    for row in &result.rows {
        lines.push(
            row.iter()
                .map(csv_value)
                .collect::<Vec<_>>()
                .join(","),
        );
    }
    lines.join("\n")
}

fn csv_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => csv_field(s),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        other => csv_field(&other.to_string()),
    }
}

/// Quote a field when it contains a delimiter, quote or line break.
fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
