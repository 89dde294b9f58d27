//! Integration tests for the read-only statement guard.
//!
//! These tests drive `execute_query` against an in-memory backend and verify
//! which statements reach the database and in what form.

mod common;

use common::{FakeBackend, guard, guard_with, result};
use serde_json::json;
use std::sync::Arc;
use vertica_mcp_server::error::DbError;
use vertica_mcp_server::tools::{ExecuteQueryInput, QueryToolHandler};

fn input(sql: &str) -> ExecuteQueryInput {
    ExecuteQueryInput {
        sql: sql.to_string(),
        limit: None,
    }
}

// =========================================================================
// Blocked statements
// =========================================================================

#[tokio::test]
async fn test_data_modifying_statements_never_reach_database() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(backend.clone(), guard());

    for sql in [
        "INSERT INTO employees VALUES (1, 'Ada')",
        "UPDATE employees SET salary = 0",
        "DELETE FROM employees",
        "DROP TABLE employees",
        "CREATE TABLE t (id INT)",
        "ALTER TABLE employees ADD COLUMN x INT",
        "TRUNCATE TABLE employees",
        "MERGE INTO employees USING staging ON 1=1 WHEN MATCHED THEN DELETE",
        "COPY employees FROM STDIN",
        "GRANT SELECT ON employees TO public",
        "REVOKE SELECT ON employees FROM public",
    ] {
        let err = handler.execute_query(input(sql)).await.unwrap_err();
        assert!(
            matches!(err, DbError::DisallowedStatement { .. }),
            "{sql} should be disallowed, got {err:?}"
        );
    }

    assert!(backend.executed().is_empty());
}

#[tokio::test]
async fn test_hidden_write_inside_cte_is_blocked() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(backend.clone(), guard());

    let err = handler
        .execute_query(input(
            "WITH gone AS (DELETE FROM employees RETURNING id) SELECT * FROM gone",
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::DisallowedStatement { .. }));
    assert!(backend.executed().is_empty());
}

#[tokio::test]
async fn test_multiple_statements_rejected() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(backend.clone(), guard());

    let err = handler
        .execute_query(input("SELECT 1; DROP TABLE employees"))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::MultiStatementRejected));
    assert!(backend.executed().is_empty());
}

#[tokio::test]
async fn test_keywords_inside_literals_are_not_statements() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(backend.clone(), guard());

    handler
        .execute_query(input(
            "SELECT 'DROP TABLE employees; DELETE' AS note FROM employees",
        ))
        .await
        .expect("literal text should not trip the guard");

    assert_eq!(backend.executed().len(), 1);
}

// =========================================================================
// Automatic LIMIT
// =========================================================================

#[tokio::test]
async fn test_limit_appended_exactly_once() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(backend.clone(), guard());

    let out = handler
        .execute_query(input("SELECT * FROM employees;"))
        .await
        .unwrap();

    assert_eq!(out.query, "SELECT * FROM employees LIMIT 100");
    assert_eq!(
        backend.last_sql().as_deref(),
        Some("SELECT * FROM employees LIMIT 100")
    );
}

#[tokio::test]
async fn test_existing_limit_is_kept() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(backend.clone(), guard());

    handler
        .execute_query(input("SELECT * FROM employees LIMIT 5"))
        .await
        .unwrap();

    let sql = backend.last_sql().unwrap();
    assert_eq!(sql.matches("LIMIT").count(), 1);
    assert!(sql.ends_with("LIMIT 5"));
}

#[tokio::test]
async fn test_subquery_limit_does_not_count() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(backend.clone(), guard());

    handler
        .execute_query(input(
            "SELECT * FROM (SELECT id FROM employees LIMIT 3) sub",
        ))
        .await
        .unwrap();

    assert!(backend.last_sql().unwrap().ends_with(") sub LIMIT 100"));
}

#[tokio::test]
async fn test_requested_limit_is_clamped() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(backend.clone(), guard());

    handler
        .execute_query(ExecuteQueryInput {
            sql: "SELECT id FROM employees".into(),
            limit: Some(1_000_000),
        })
        .await
        .unwrap();

    assert_eq!(
        backend.last_sql().as_deref(),
        Some("SELECT id FROM employees LIMIT 10000")
    );
}

#[tokio::test]
async fn test_describe_and_explain_are_sent_without_limit() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(backend.clone(), guard());

    handler
        .execute_query(input("EXPLAIN SELECT * FROM employees"))
        .await
        .unwrap();
    assert_eq!(
        backend.last_sql().as_deref(),
        Some("EXPLAIN SELECT * FROM employees")
    );

    handler
        .execute_query(input("DESCRIBE employees"))
        .await
        .unwrap();
    assert_eq!(backend.last_sql().as_deref(), Some("DESCRIBE employees"));
}

#[tokio::test]
async fn test_rows_returned_as_objects() {
    let backend = FakeBackend::new()
        .respond(
            "FROM employees",
            result(
                &[("id", "Integer"), ("name", "Varchar")],
                vec![vec![json!(1), json!("Ada")], vec![json!(2), json!("Grace")]],
            ),
        )
        .into_arc();
    let handler = QueryToolHandler::new(backend, guard());

    let out = handler
        .execute_query(input("SELECT id, name FROM employees"))
        .await
        .unwrap();

    assert_eq!(out.row_count, 2);
    assert!(!out.truncated);
    assert_eq!(out.rows[1]["name"], json!("Grace"));
}

#[tokio::test]
async fn test_database_errors_are_reported() {
    let backend = Arc::new(FakeBackend::new().failing("Syntax error at or near \"FORM\""));
    let handler = QueryToolHandler::new(backend, guard());

    let err = handler
        .execute_query(input("SELECT * FORM employees"))
        .await
        .unwrap_err();

    match err {
        DbError::UpstreamQuery { message, sql_state } => {
            assert!(message.contains("FORM"));
            assert_eq!(sql_state.as_deref(), Some("42601"));
        }
        other => panic!("expected upstream error, got {other:?}"),
    }
}

// =========================================================================
// Whitelist
// =========================================================================

#[tokio::test]
async fn test_table_whitelist_blocks_unlisted_tables() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(backend.clone(), guard_with(&["employees"], &[]));

    handler
        .execute_query(input("SELECT id FROM employees"))
        .await
        .expect("whitelisted table should be allowed");

    let err = handler
        .execute_query(input(
            "SELECT e.id FROM employees e JOIN departments d ON e.dept_id = d.dept_id",
        ))
        .await
        .unwrap_err();
    match err {
        DbError::WhitelistViolation { kind, object } => {
            assert_eq!(kind, "table");
            assert!(object.contains("departments"));
        }
        other => panic!("expected whitelist violation, got {other:?}"),
    }

    assert_eq!(backend.executed().len(), 1);
}

#[tokio::test]
async fn test_whitelist_applies_inside_subqueries() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(backend.clone(), guard_with(&["employees"], &[]));

    let err = handler
        .execute_query(input(
            "SELECT id FROM employees WHERE dept_id IN (SELECT dept_id FROM departments)",
        ))
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::WhitelistViolation { .. }));
    assert!(backend.executed().is_empty());
}

#[tokio::test]
async fn test_cte_names_are_not_tables() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(backend, guard_with(&["employees"], &[]));

    handler
        .execute_query(input(
            "WITH recent AS (SELECT id FROM employees) SELECT id FROM recent",
        ))
        .await
        .expect("CTE reference should not need whitelisting");
}

#[tokio::test]
async fn test_column_whitelist_rejects_star_and_unlisted_columns() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(
        backend,
        guard_with(&["employees"], &["employees.id", "employees.name"]),
    );

    handler
        .execute_query(input("SELECT id, name FROM employees"))
        .await
        .expect("listed columns should be allowed");

    let star = handler
        .execute_query(input("SELECT * FROM employees"))
        .await
        .unwrap_err();
    assert!(matches!(star, DbError::WhitelistViolation { .. }));

    let salary = handler
        .execute_query(input("SELECT id, salary FROM employees"))
        .await
        .unwrap_err();
    match salary {
        DbError::WhitelistViolation { kind, object } => {
            assert_eq!(kind, "column");
            assert!(object.contains("salary"));
        }
        other => panic!("expected column violation, got {other:?}"),
    }
}

#[tokio::test]
async fn test_cte_cannot_shadow_an_unlisted_table() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(backend.clone(), guard_with(&["employees"], &[]));

    let err = handler
        .execute_query(input(
            "WITH departments AS (SELECT * FROM departments) SELECT * FROM departments",
        ))
        .await
        .unwrap_err();
    match err {
        DbError::WhitelistViolation { kind, object } => {
            assert_eq!(kind, "table");
            assert_eq!(object, "departments");
        }
        other => panic!("expected table violation, got {other:?}"),
    }
    assert!(backend.executed().is_empty());
}

#[tokio::test]
async fn test_alias_named_like_hidden_column_is_rejected() {
    let backend = FakeBackend::new().into_arc();
    let handler = QueryToolHandler::new(
        backend.clone(),
        guard_with(&["employees"], &["employees.id", "employees.name"]),
    );

    for sql in [
        "SELECT salary AS salary FROM employees",
        "SELECT salary salary FROM employees",
    ] {
        let err = handler.execute_query(input(sql)).await.unwrap_err();
        assert!(
            matches!(err, DbError::WhitelistViolation { ref object, .. } if object == "employees.salary"),
            "{sql}: {err:?}"
        );
    }
    assert!(backend.executed().is_empty());

    handler
        .execute_query(input("SELECT name AS salary FROM employees ORDER BY salary"))
        .await
        .expect("ORDER BY may name an output alias");
}
