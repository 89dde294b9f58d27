//! Shared fixtures for integration tests.
//!
//! `FakeBackend` stands in for Vertica: it records every statement it receives
//! and answers with canned results picked by a substring of the SQL.

#![allow(dead_code)]

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::{Value as JsonValue, json};
use std::sync::{Arc, Mutex};
use vertica_mcp_server::db::QueryBackend;
use vertica_mcp_server::error::{DbError, DbResult};
use vertica_mcp_server::models::{ColumnMetadata, QueryResult, Whitelist};
use vertica_mcp_server::tools::SqlGuard;

#[derive(Default)]
pub struct FakeBackend {
    responses: Vec<(String, QueryResult)>,
    failure: Option<String>,
    executed: Mutex<Vec<String>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer statements containing `needle` with `result`.
    pub fn respond(mut self, needle: &str, result: QueryResult) -> Self {
        self.responses.push((needle.to_string(), result));
        self
    }

    /// Fail every statement with an upstream error.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn last_sql(&self) -> Option<String> {
        self.executed().last().cloned()
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }
}

impl QueryBackend for FakeBackend {
    fn fetch<'a>(&'a self, sql: &'a str, max_rows: usize) -> BoxFuture<'a, DbResult<QueryResult>> {
        async move {
            self.executed.lock().unwrap().push(sql.to_string());
            if let Some(message) = &self.failure {
                return Err(DbError::upstream_query(message.clone(), Some("42601".into())));
            }
            let mut result = self
                .responses
                .iter()
                .find(|(needle, _)| sql.contains(needle.as_str()))
                .map(|(_, result)| result.clone())
                .unwrap_or_else(|| QueryResult::empty(0));
            result.cap_rows(max_rows);
            Ok(result)
        }
        .boxed()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        async {}.boxed()
    }
}

/// Build a result set from `(name, type)` pairs and rows.
pub fn result(columns: &[(&str, &str)], rows: Vec<Vec<JsonValue>>) -> QueryResult {
    QueryResult {
        columns: columns
            .iter()
            .map(|(name, type_name)| ColumnMetadata::new(*name, *type_name))
            .collect(),
        rows,
        truncated: false,
        execution_time_ms: 2,
    }
}

pub fn guard() -> Arc<SqlGuard> {
    Arc::new(SqlGuard::new(100, Whitelist::unrestricted()))
}

pub fn guard_with(tables: &[&str], columns: &[&str]) -> Arc<SqlGuard> {
    Arc::new(SqlGuard::new(100, Whitelist::new(tables, columns)))
}

/// `v_catalog.columns` rows for a `departments` table.
pub fn departments_columns() -> QueryResult {
    let columns = [
        ("table_schema", "Varchar"),
        ("column_name", "Varchar"),
        ("data_type", "Varchar"),
        ("data_type_length", "Integer"),
        ("numeric_precision", "Integer"),
        ("numeric_scale", "Integer"),
        ("is_nullable", "Boolean"),
        ("column_default", "Varchar"),
        ("ordinal_position", "Integer"),
    ];
    result(
        &columns,
        vec![
            vec![
                json!("public"),
                json!("dept_id"),
                json!("int"),
                json!(8),
                JsonValue::Null,
                JsonValue::Null,
                json!("f"),
                JsonValue::Null,
                json!(1),
            ],
            vec![
                json!("public"),
                json!("dept_name"),
                json!("varchar(80)"),
                json!(80),
                JsonValue::Null,
                JsonValue::Null,
                json!("f"),
                JsonValue::Null,
                json!(2),
            ],
            vec![
                json!("public"),
                json!("budget"),
                json!("numeric(12,2)"),
                json!(8),
                json!(12),
                json!(2),
                json!("t"),
                json!("0"),
                json!(3),
            ],
            vec![
                json!("public"),
                json!("opened_on"),
                json!("date"),
                json!(8),
                JsonValue::Null,
                JsonValue::Null,
                json!("t"),
                JsonValue::Null,
                json!(4),
            ],
        ],
    )
}

/// `v_catalog.tables` rows for `employees` and `departments`.
pub fn tables() -> QueryResult {
    let columns = [
        ("table_schema", "Varchar"),
        ("table_name", "Varchar"),
        ("table_type", "Varchar"),
        ("estimated_row_count", "Integer"),
        ("storage_bytes", "Integer"),
        ("comment", "Varchar"),
    ];
    result(
        &columns,
        vec![
            vec![
                json!("public"),
                json!("departments"),
                json!("TABLE"),
                json!(12),
                json!(2048),
                JsonValue::Null,
            ],
            vec![
                json!("public"),
                json!("employees"),
                json!("TABLE"),
                json!(1500),
                json!(1048576),
                json!("Staff directory"),
            ],
        ],
    )
}
