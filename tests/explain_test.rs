//! Integration tests for the explain and sample query tools.

mod common;

use common::{FakeBackend, departments_columns, guard, guard_with, result};
use serde_json::json;
use vertica_mcp_server::error::DbError;
use vertica_mcp_server::tools::{
    DescribeTableInput, ExplainInput, ExplainToolHandler, SampleQueryToolHandler,
    SchemaToolHandler,
};

fn plan() -> vertica_mcp_server::models::QueryResult {
    result(
        &[("QUERY PLAN", "Varchar")],
        vec![
            vec![json!("Access Path:")],
            vec![json!("+-STORAGE ACCESS for employees [Cost: 12, Rows: 1K]")],
        ],
    )
}

// =========================================================================
// explain_query
// =========================================================================

#[tokio::test]
async fn test_explain_prefixes_select() {
    let backend = FakeBackend::new().respond("EXPLAIN", plan()).into_arc();
    let handler = ExplainToolHandler::new(backend.clone(), guard());

    let out = handler
        .explain(ExplainInput {
            sql: "SELECT * FROM employees".into(),
        })
        .await
        .unwrap();

    assert_eq!(out.query, "EXPLAIN SELECT * FROM employees");
    assert_eq!(out.plan_lines.len(), 2);
    assert!(out.plan.starts_with("Access Path:\n+-STORAGE ACCESS"));
    assert_eq!(
        backend.last_sql().as_deref(),
        Some("EXPLAIN SELECT * FROM employees")
    );
}

#[tokio::test]
async fn test_explain_is_not_doubled() {
    let backend = FakeBackend::new().respond("EXPLAIN", plan()).into_arc();
    let handler = ExplainToolHandler::new(backend.clone(), guard());

    handler
        .explain(ExplainInput {
            sql: "explain SELECT * FROM employees".into(),
        })
        .await
        .unwrap();

    let sql = backend.last_sql().unwrap();
    assert_eq!(sql.to_uppercase().matches("EXPLAIN").count(), 1);
    assert!(!sql.contains("LIMIT"));
}

#[tokio::test]
async fn test_explain_rejects_writes() {
    let backend = FakeBackend::new().into_arc();
    let handler = ExplainToolHandler::new(backend.clone(), guard());

    let err = handler
        .explain(ExplainInput {
            sql: "EXPLAIN DELETE FROM employees".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::DisallowedStatement { .. }));
    assert!(backend.executed().is_empty());
}

#[tokio::test]
async fn test_explain_rejects_describe() {
    let backend = FakeBackend::new().into_arc();
    let handler = ExplainToolHandler::new(backend.clone(), guard());

    let err = handler
        .explain(ExplainInput {
            sql: "DESCRIBE employees".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::InvalidInput { .. }));
    assert!(backend.executed().is_empty());
}

#[tokio::test]
async fn test_explain_checks_whitelist() {
    let backend = FakeBackend::new().into_arc();
    let handler = ExplainToolHandler::new(backend, guard_with(&["employees"], &[]));

    let err = handler
        .explain(ExplainInput {
            sql: "SELECT * FROM payroll".into(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::WhitelistViolation { .. }));
}

// =========================================================================
// generate_sample_queries
// =========================================================================

#[tokio::test]
async fn test_sample_queries_follow_column_types() {
    let backend = FakeBackend::new()
        .respond("v_catalog.columns", departments_columns())
        .into_arc();
    let schema = SchemaToolHandler::new(backend, guard());

    let out = SampleQueryToolHandler::new(&schema)
        .generate(DescribeTableInput {
            table_name: "departments".into(),
            schema_name: None,
        })
        .await
        .unwrap();

    assert_eq!(out.schema_name, "public");
    assert_eq!(out.count, out.queries.len());

    let sql: Vec<&str> = out.queries.iter().map(|q| q.sql.as_str()).collect();
    assert_eq!(sql[0], "SELECT * FROM public.departments LIMIT 10");
    assert_eq!(sql[1], "SELECT COUNT(*) AS row_count FROM public.departments");
    assert!(sql.iter().any(|s| s.contains("MIN(dept_id) AS min_value")));
    assert!(sql.iter().any(|s| s.starts_with("SELECT DISTINCT dept_name")));
    assert!(sql.iter().any(|s| s.contains("AVG(budget)")));
    assert!(sql.iter().any(|s| s.contains("MAX(opened_on) AS latest")));
    assert_eq!(out.count, 6);
}

#[tokio::test]
async fn test_generated_queries_pass_the_guard() {
    let backend = FakeBackend::new()
        .respond("v_catalog.columns", departments_columns())
        .into_arc();
    let guard = guard();
    let schema = SchemaToolHandler::new(backend, guard.clone());

    let out = SampleQueryToolHandler::new(&schema)
        .generate(DescribeTableInput {
            table_name: "departments".into(),
            schema_name: Some("public".into()),
        })
        .await
        .unwrap();

    for query in &out.queries {
        guard
            .validate(&query.sql)
            .unwrap_or_else(|e| panic!("{} rejected: {e}", query.sql));
    }
}
