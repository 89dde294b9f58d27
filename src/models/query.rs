//! Query-related data models.
//!
//! This module defines the result set shape shared by the backend, the tool
//! handlers and the formatters.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;

/// Default row limit for query results (`QUERY_LIMIT_SIZE`).
pub const DEFAULT_ROW_LIMIT: u32 = 100;

/// Maximum allowed row limit for `execute_query`.
pub const MAX_ROW_LIMIT: u32 = 10000;

/// Default row cap for exports (`MAX_ROWS_EXPORT`).
pub const DEFAULT_EXPORT_LIMIT: u32 = 10000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ColumnMetadata {
    pub name: String,
    /// Vertica type name (e.g., "Integer", "Varchar", "Numeric")
    pub type_name: String,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// Rows returned by one statement, in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    /// Each row holds one JSON-safe value per column.
    pub rows: Vec<Vec<JsonValue>>,
    /// True when the database had more rows than the requested cap.
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create an empty result.
    pub fn empty(execution_time_ms: u64) -> Self {
        Self {
            execution_time_ms,
            ..Self::default()
        }
    }

    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column by case-insensitive name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Rows as key-value maps (column name to value).
    pub fn row_maps(&self) -> Vec<serde_json::Map<String, JsonValue>> {
        let keys = self.row_keys();
        self.rows
            .iter()
            .map(|row| keys.iter().cloned().zip(row.iter().cloned()).collect())
            .collect()
    }

    /// Map keys for the columns; a repeated name gets a `_2`, `_3`... suffix.
    pub fn row_keys(&self) -> Vec<String> {
        let mut taken = HashSet::new();
        self.columns
            .iter()
            .map(|col| {
                let mut key = col.name.clone();
                let mut n = 1;
                while !taken.insert(key.clone()) {
                    n += 1;
                    key = format!("{}_{n}", col.name);
                }
                key
            })
            .collect()
    }

    /// Iterate rows with access by column name.
    pub fn records(&self) -> impl Iterator<Item = Record<'_>> {
        self.rows.iter().map(move |values| Record {
            result: self,
            values,
        })
    }

    /// Keep at most `max_rows` rows, setting `truncated` when rows were dropped.
    pub fn cap_rows(&mut self, max_rows: usize) {
        if self.rows.len() > max_rows {
            self.rows.truncate(max_rows);
            self.truncated = true;
        }
    }
}

/// Borrowed view of one row, used to read catalog results by column name.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    result: &'a QueryResult,
    values: &'a [JsonValue],
}

impl<'a> Record<'a> {
    pub fn get(&self, column: &str) -> Option<&'a JsonValue> {
        self.result
            .column_index(column)
            .and_then(|idx| self.values.get(idx))
            .filter(|v| !v.is_null())
    }

    pub fn get_str(&self, column: &str) -> Option<&'a str> {
        self.get(column).and_then(JsonValue::as_str)
    }

    /// String value, or the JSON text of a non-string value.
    pub fn get_string(&self, column: &str) -> Option<String> {
        self.get(column).map(|v| match v {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Boolean value; accepts JSON booleans and Vertica's `t`/`f` text.
    pub fn get_bool(&self, column: &str) -> Option<bool> {
        match self.get(column)? {
            JsonValue::Bool(b) => Some(*b),
            JsonValue::String(s) => match s.to_ascii_lowercase().as_str() {
                "t" | "true" | "1" | "yes" => Some(true),
                "f" | "false" | "0" | "no" => Some(false),
                _ => None,
            },
            JsonValue::Number(n) => n.as_i64().map(|v| v != 0),
            _ => None,
        }
    }

    /// Integer value; accepts JSON numbers and numeric text.
    pub fn get_i64(&self, column: &str) -> Option<i64> {
        match self.get(column)? {
            JsonValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            JsonValue::String(s) => s
                .parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn get_u64(&self, column: &str) -> Option<u64> {
        self.get_i64(column).and_then(|v| u64::try_from(v).ok())
    }
}
