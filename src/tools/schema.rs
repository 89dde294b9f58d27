//! Schema introspection tools.
//!
//! This module implements the `list_tables`, `list_views`, `list_projections`
//! and `describe_table` MCP tools. Results are filtered by the configured
//! whitelist after they come back from the catalog.

use crate::db::catalog::CatalogInspector;
use crate::db::QueryBackend;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnInfo, ProjectionInfo, TableInfo, ViewInfo, Whitelist};
use crate::tools::sql_guard::SqlGuard;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Format bytes as human-readable size string.
///
/// Uses binary units (1 kB = 1024 bytes), like Vertica's own storage reports.
///
/// # Examples
///
/// ```
/// use vertica_mcp_server::tools::schema::format_size;
///
/// assert_eq!(format_size(512), "512 B");
/// assert_eq!(format_size(1024), "1 kB");
/// assert_eq!(format_size(1048576), "1 MB");
/// ```
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::WINDOWS)
}

/// Input shared by the listing tools.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct SchemaFilterInput {
    /// Restrict the listing to this schema. Omit to list every user schema.
    #[serde(default, alias = "schema")]
    pub schema_name: Option<String>,
}

impl SchemaFilterInput {
    fn schema(&self) -> Option<&str> {
        self.schema_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

pub type ListTablesInput = SchemaFilterInput;
pub type ListViewsInput = SchemaFilterInput;
pub type ListProjectionsInput = SchemaFilterInput;

/// Output from the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    pub tables: Vec<TableInfoOutput>,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableInfoOutput {
    pub schema_name: String,
    pub table_name: String,
    /// "TABLE", "TEMPORARY TABLE" or "FLEX TABLE"
    pub table_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_row_count: Option<u64>,
    /// Bytes used by the table's projections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_human: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl From<TableInfo> for TableInfoOutput {
    fn from(info: TableInfo) -> Self {
        Self {
            table_type: info.table_type.to_string(),
            size_human: info.storage_bytes.map(format_size),
            schema_name: info.schema_name,
            table_name: info.table_name,
            estimated_row_count: info.estimated_row_count,
            storage_bytes: info.storage_bytes,
            comment: info.comment,
        }
    }
}

/// Output from the list_views tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListViewsOutput {
    pub views: Vec<ViewInfo>,
    pub count: usize,
}

/// Output from the list_projections tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListProjectionsOutput {
    pub projections: Vec<ProjectionInfo>,
    pub count: usize,
}

/// Input for the describe_table tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DescribeTableInput {
    /// Table to describe. `schema.table` is accepted.
    #[serde(alias = "table")]
    pub table_name: String,
    /// Schema containing the table. Defaults to `public` when the name is ambiguous.
    #[serde(default, alias = "schema")]
    pub schema_name: Option<String>,
}

impl DescribeTableInput {
    /// Split `schema.table` and drop blank schema values.
    pub fn target(&self) -> DbResult<(Option<String>, String)> {
        let table = self.table_name.trim();
        let schema = self
            .schema_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        match (schema, table.split_once('.')) {
            (None, Some((s, t))) if !s.is_empty() && !t.is_empty() => {
                Ok((Some(s.to_string()), t.to_string()))
            }
            (_, _) if table.is_empty() => Err(DbError::invalid_input("table_name is required")),
            (schema, _) => Ok((schema.map(String::from), table.to_string())),
        }
    }
}

/// Output from the describe_table tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DescribeTableOutput {
    pub schema_name: String,
    pub table_name: String,
    /// Columns in declared order
    pub columns: Vec<ColumnInfo>,
    pub column_count: usize,
}

/// Handler for schema introspection operations.
pub struct SchemaToolHandler {
    backend: Arc<dyn QueryBackend>,
    guard: Arc<SqlGuard>,
}

impl SchemaToolHandler {
    pub fn new(backend: Arc<dyn QueryBackend>, guard: Arc<SqlGuard>) -> Self {
        Self { backend, guard }
    }

    fn whitelist(&self) -> &Whitelist {
        self.guard.whitelist()
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> DbResult<ListTablesOutput> {
        let whitelist = self.whitelist();
        let tables: Vec<TableInfoOutput> =
            CatalogInspector::list_tables(self.backend.as_ref(), input.schema())
                .await?
                .into_iter()
                .filter(|t| whitelist.permits_table(Some(&t.schema_name), &t.table_name))
                .map(Into::into)
                .collect();

        info!(count = tables.len(), schema = ?input.schema(), "Listed tables");
        Ok(ListTablesOutput {
            count: tables.len(),
            tables,
        })
    }

    pub async fn list_views(&self, input: ListViewsInput) -> DbResult<ListViewsOutput> {
        let whitelist = self.whitelist();
        let views: Vec<ViewInfo> =
            CatalogInspector::list_views(self.backend.as_ref(), input.schema())
                .await?
                .into_iter()
                .filter(|v| whitelist.permits_table(Some(&v.schema_name), &v.view_name))
                .collect();

        info!(count = views.len(), schema = ?input.schema(), "Listed views");
        Ok(ListViewsOutput {
            count: views.len(),
            views,
        })
    }

    pub async fn list_projections(
        &self,
        input: ListProjectionsInput,
    ) -> DbResult<ListProjectionsOutput> {
        let whitelist = self.whitelist();
        let projections: Vec<ProjectionInfo> =
            CatalogInspector::list_projections(self.backend.as_ref(), input.schema())
                .await?
                .into_iter()
                .filter(|p| whitelist.permits_table(Some(&p.schema_name), &p.anchor_table_name))
                .collect();

        info!(count = projections.len(), schema = ?input.schema(), "Listed projections");
        Ok(ListProjectionsOutput {
            count: projections.len(),
            projections,
        })
    }

    pub async fn describe_table(&self, input: DescribeTableInput) -> DbResult<DescribeTableOutput> {
        let (schema, table) = input.target()?;
        let (schema_name, columns) = self.resolve_columns(schema.as_deref(), &table).await?;

        info!(
            table = %table,
            schema = %schema_name,
            columns = columns.len(),
            "Described table"
        );
        Ok(DescribeTableOutput {
            schema_name,
            table_name: table,
            column_count: columns.len(),
            columns,
        })
    }

    /// Read a table's columns with whitelist checks applied.
    ///
    /// Fails when the table is not whitelisted or does not exist; columns
    /// outside the column whitelist are dropped.
    pub async fn resolve_columns(
        &self,
        schema: Option<&str>,
        table: &str,
    ) -> DbResult<(String, Vec<ColumnInfo>)> {
        let whitelist = self.whitelist();
        if !whitelist.permits_table(schema, table) {
            return Err(DbError::whitelist_violation("table", qualified(schema, table)));
        }

        let (resolved, columns) =
            CatalogInspector::describe_columns(self.backend.as_ref(), table, schema).await?;
        let Some(resolved) = resolved else {
            return Err(DbError::invalid_input(format!(
                "Table '{}' not found",
                qualified(schema, table)
            )));
        };
        if !whitelist.permits_table(Some(&resolved), table) {
            return Err(DbError::whitelist_violation("table", qualified(Some(&resolved), table)));
        }

        let columns = columns
            .into_iter()
            .filter(|c| whitelist.permits_column(Some(table), &c.column_name))
            .collect();
        Ok((resolved, columns))
    }
}

fn qualified(schema: Option<&str>, table: &str) -> String {
    match schema {
        Some(schema) => format!("{schema}.{table}"),
        None => table.to_string(),
    }
}
