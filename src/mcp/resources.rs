//! MCP resources.
//!
//! Two read-only resources are exposed:
//! - `vertica://schema/overview`: tables, views and projections with counts
//! - `vertica://table/{schema}.{table}`: column list of one table

use crate::error::{DbError, DbResult};
use crate::models::{ColumnInfo, ProjectionInfo, ViewInfo};
use crate::tools::schema::{
    DescribeTableInput, SchemaFilterInput, SchemaToolHandler, TableInfoOutput,
};
use chrono::Utc;
use rmcp::model::{AnnotateAble, RawResource, Resource};
use serde::Serialize;
use tracing::debug;

pub const OVERVIEW_URI: &str = "vertica://schema/overview";
pub const TABLE_URI_PREFIX: &str = "vertica://table/";

/// Tables listed individually by `resources/list`.
pub const MAX_LISTED_TABLES: usize = 50;

const JSON_MIME: &str = "application/json";

/// Parsed resource URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceUri {
    Overview,
    Table { schema: String, table: String },
}

impl ResourceUri {
    pub fn parse(uri: &str) -> DbResult<Self> {
        if uri == OVERVIEW_URI {
            return Ok(Self::Overview);
        }
        let qualified = uri
            .strip_prefix(TABLE_URI_PREFIX)
            .ok_or_else(|| DbError::invalid_input(format!("Unknown resource URI: {uri}")))?;
        match qualified.split_once('.') {
            Some((schema, table)) if !schema.is_empty() && !table.is_empty() => Ok(Self::Table {
                schema: schema.to_string(),
                table: table.to_string(),
            }),
            _ => Err(DbError::invalid_input(format!(
                "Table resource URI must look like {TABLE_URI_PREFIX}schema.table, got: {uri}"
            ))),
        }
    }
}

pub fn table_uri(schema: &str, table: &str) -> String {
    format!("{TABLE_URI_PREFIX}{schema}.{table}")
}

#[derive(Debug, Serialize)]
struct SchemaOverview {
    database_type: &'static str,
    tables: Vec<TableInfoOutput>,
    table_count: usize,
    views: Vec<ViewInfo>,
    view_count: usize,
    projections: Vec<ProjectionInfo>,
    projection_count: usize,
    generated_at: String,
}

#[derive(Debug, Serialize)]
struct TableResource {
    schema_name: String,
    table_name: String,
    columns: Vec<ColumnInfo>,
    column_count: usize,
    generated_at: String,
}

/// Overview resource plus one entry per visible table.
pub async fn build_resource_list(handler: &SchemaToolHandler) -> DbResult<Vec<Resource>> {
    let mut resources = vec![create_resource(
        OVERVIEW_URI,
        "Schema overview",
        "Tables, views and projections visible to this server",
    )];

    let tables = handler.list_tables(SchemaFilterInput::default()).await?;
    resources.extend(tables.tables.iter().take(MAX_LISTED_TABLES).map(|t| {
        create_resource(
            &table_uri(&t.schema_name, &t.table_name),
            &format!("{}.{}", t.schema_name, t.table_name),
            &format!("Columns of {} {}", t.table_type.to_lowercase(), t.table_name),
        )
    }));

    debug!(count = resources.len(), "Listed resources");
    Ok(resources)
}

/// Read a resource as pretty-printed JSON.
pub async fn read_resource(handler: &SchemaToolHandler, uri: &str) -> DbResult<String> {
    let generated_at = Utc::now().to_rfc3339();
    let content = match ResourceUri::parse(uri)? {
        ResourceUri::Overview => {
            let tables = handler.list_tables(SchemaFilterInput::default()).await?;
            let views = handler.list_views(SchemaFilterInput::default()).await?;
            let projections = handler
                .list_projections(SchemaFilterInput::default())
                .await?;
            to_json(&SchemaOverview {
                database_type: "Vertica",
                table_count: tables.count,
                tables: tables.tables,
                view_count: views.count,
                views: views.views,
                projection_count: projections.count,
                projections: projections.projections,
                generated_at,
            })?
        }
        ResourceUri::Table { schema, table } => {
            let described = handler
                .describe_table(DescribeTableInput {
                    table_name: table,
                    schema_name: Some(schema),
                })
                .await?;
            to_json(&TableResource {
                schema_name: described.schema_name,
                table_name: described.table_name,
                column_count: described.column_count,
                columns: described.columns,
                generated_at,
            })?
        }
    };
    Ok(content)
}

fn to_json<T: Serialize>(value: &T) -> DbResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| DbError::internal(format!("Failed to serialize resource: {e}")))
}

fn create_resource(uri: &str, name: &str, description: &str) -> Resource {
    let mut resource = RawResource::new(uri, name);
    resource.description = Some(description.to_string());
    resource.mime_type = Some(JSON_MIME.to_string());
    resource.no_annotation()
}
