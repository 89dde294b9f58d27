//! Integration tests for the schema resources.

mod common;

use common::{FakeBackend, departments_columns, guard, guard_with, tables};
use serde_json::Value as JsonValue;
use vertica_mcp_server::error::DbError;
use vertica_mcp_server::mcp::resources::{
    OVERVIEW_URI, build_resource_list, read_resource, table_uri,
};
use vertica_mcp_server::tools::SchemaToolHandler;

#[tokio::test]
async fn test_resource_list_has_overview_and_tables() {
    let backend = FakeBackend::new().respond("v_catalog.tables", tables()).into_arc();
    let handler = SchemaToolHandler::new(backend, guard());

    let resources = build_resource_list(&handler).await.unwrap();
    let uris: Vec<&str> = resources.iter().map(|r| r.uri.as_str()).collect();

    assert_eq!(
        uris,
        [
            OVERVIEW_URI,
            "vertica://table/public.departments",
            "vertica://table/public.employees",
        ]
    );
    assert_eq!(resources[0].mime_type.as_deref(), Some("application/json"));
}

#[tokio::test]
async fn test_resource_list_hides_unlisted_tables() {
    let backend = FakeBackend::new().respond("v_catalog.tables", tables()).into_arc();
    let handler = SchemaToolHandler::new(backend, guard_with(&["employees"], &[]));

    let resources = build_resource_list(&handler).await.unwrap();

    assert_eq!(resources.len(), 2);
    assert_eq!(resources[1].uri, table_uri("public", "employees"));
}

#[tokio::test]
async fn test_read_overview() {
    let backend = FakeBackend::new().respond("v_catalog.tables", tables()).into_arc();
    let handler = SchemaToolHandler::new(backend, guard());

    let text = read_resource(&handler, OVERVIEW_URI).await.unwrap();
    let overview: JsonValue = serde_json::from_str(&text).unwrap();

    assert_eq!(overview["database_type"], "Vertica");
    assert_eq!(overview["table_count"], 2);
    assert_eq!(overview["tables"][1]["table_name"], "employees");
    assert_eq!(overview["view_count"], 0);
    assert_eq!(overview["projection_count"], 0);
    assert!(overview["generated_at"].as_str().is_some());
}

#[tokio::test]
async fn test_read_table_resource() {
    let backend = FakeBackend::new()
        .respond("v_catalog.columns", departments_columns())
        .into_arc();
    let handler = SchemaToolHandler::new(backend, guard());

    let text = read_resource(&handler, "vertica://table/public.departments")
        .await
        .unwrap();
    let table: JsonValue = serde_json::from_str(&text).unwrap();

    assert_eq!(table["schema_name"], "public");
    assert_eq!(table["table_name"], "departments");
    assert_eq!(table["column_count"], 4);
    assert_eq!(table["columns"][0]["column_name"], "dept_id");
    assert_eq!(table["columns"][0]["is_nullable"], false);
}

#[tokio::test]
async fn test_read_unknown_resource() {
    let backend = FakeBackend::new().into_arc();
    let handler = SchemaToolHandler::new(backend.clone(), guard());

    let err = read_resource(&handler, "vertica://nothing/here")
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::InvalidInput { .. }));
    assert!(backend.executed().is_empty());
}

#[tokio::test]
async fn test_read_table_resource_outside_whitelist() {
    let backend = FakeBackend::new()
        .respond("v_catalog.columns", departments_columns())
        .into_arc();
    let handler = SchemaToolHandler::new(backend.clone(), guard_with(&["employees"], &[]));

    let err = read_resource(&handler, "vertica://table/public.departments")
        .await
        .unwrap_err();

    assert!(matches!(err, DbError::WhitelistViolation { .. }));
    assert!(backend.executed().is_empty());
}
