//! Catalog introspection.
//!
//! This module reads tables, views, projections and columns from Vertica's
//! `v_catalog` and `v_monitor` system schemas.
//!
//! # Architecture
//!
//! SQL text lives in the `queries` submodule. Vertica's simple-query protocol
//! has no bind parameters, so caller-supplied names are validated and embedded
//! as quoted literals (see [`quote_literal`]). Whitelist filtering is left to
//! the tool layer.

use crate::db::backend::QueryBackend;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnInfo, ProjectionInfo, QueryResult, TableInfo, TableType, ViewInfo};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Upper bound on rows read from a catalog query.
pub const CATALOG_ROW_LIMIT: usize = 50_000;

/// Longest identifier Vertica accepts.
const MAX_IDENTIFIER_LEN: usize = 128;

/// Schema preferred when a bare table name exists in several schemas.
pub const DEFAULT_SCHEMA: &str = "public";

/// Run a catalog query; a listing cut at the row cap is logged, not failed.
async fn fetch_catalog(backend: &dyn QueryBackend, sql: &str) -> DbResult<QueryResult> {
    let result = backend.fetch(sql, CATALOG_ROW_LIMIT).await?;
    if result.truncated {
        warn!(limit = CATALOG_ROW_LIMIT, "Catalog listing truncated");
    }
    Ok(result)
}

/// Catalog inspector for Vertica introspection.
pub struct CatalogInspector;

impl CatalogInspector {
    /// List user tables, optionally restricted to one schema.
    pub async fn list_tables(
        backend: &dyn QueryBackend,
        schema: Option<&str>,
    ) -> DbResult<Vec<TableInfo>> {
        let sql = with_filter(
            queries::LIST_TABLES,
            "t.table_schema",
            schema,
            "t.table_schema, t.table_name",
        )?;
        let result = fetch_catalog(backend, &sql).await?;

        let tables: Vec<TableInfo> = result
            .records()
            .map(|r| {
                let mut table = TableInfo::new(
                    r.get_string("table_schema").unwrap_or_default(),
                    r.get_string("table_name").unwrap_or_default(),
                    TableType::parse(r.get_str("table_type").unwrap_or("TABLE")),
                );
                if let Some(rows) = r.get_u64("estimated_row_count") {
                    table = table.with_row_count(rows);
                }
                if let Some(bytes) = r.get_u64("storage_bytes") {
                    table = table.with_storage_bytes(bytes);
                }
                if let Some(comment) = r.get_string("comment") {
                    table = table.with_comment(comment);
                }
                table
            })
            .collect();

        debug!(count = tables.len(), schema = ?schema, "Listed tables");
        Ok(tables)
    }

    /// List user views, optionally restricted to one schema.
    pub async fn list_views(
        backend: &dyn QueryBackend,
        schema: Option<&str>,
    ) -> DbResult<Vec<ViewInfo>> {
        let sql = with_filter(
            queries::LIST_VIEWS,
            "v.table_schema",
            schema,
            "v.table_schema, v.table_name",
        )?;
        let result = fetch_catalog(backend, &sql).await?;

        Ok(result
            .records()
            .map(|r| {
                let mut view = ViewInfo::new(
                    r.get_string("table_schema").unwrap_or_default(),
                    r.get_string("table_name").unwrap_or_default(),
                );
                if let Some(definition) = r.get_string("view_definition") {
                    view = view.with_definition(definition);
                }
                if let Some(comment) = r.get_string("comment") {
                    view = view.with_comment(comment);
                }
                view
            })
            .collect())
    }

    /// List user projections with their sort order.
    pub async fn list_projections(
        backend: &dyn QueryBackend,
        schema: Option<&str>,
    ) -> DbResult<Vec<ProjectionInfo>> {
        let sql = with_filter(
            queries::LIST_PROJECTIONS,
            "p.projection_schema",
            schema,
            "p.projection_schema, p.projection_name",
        )?;
        let result = fetch_catalog(backend, &sql).await?;

        let sort_sql = with_filter(
            queries::PROJECTION_SORT_COLUMNS,
            "pc.table_schema",
            schema,
            "pc.table_schema, pc.projection_name, pc.sort_position",
        )?;
        let sort_result = fetch_catalog(backend, &sort_sql).await?;

        // (schema, projection) -> columns, already in sort_position order
        let mut sort_orders: HashMap<(String, String), Vec<String>> = HashMap::new();
        for r in sort_result.records() {
            let key = (
                r.get_string("table_schema").unwrap_or_default(),
                r.get_string("projection_name").unwrap_or_default(),
            );
            if let Some(column) = r.get_string("table_column_name") {
                sort_orders.entry(key).or_default().push(column);
            }
        }

        Ok(result
            .records()
            .map(|r| {
                let schema_name = r.get_string("projection_schema").unwrap_or_default();
                let projection_name = r.get_string("projection_name").unwrap_or_default();
                let sort_order = sort_orders
                    .remove(&(schema_name.clone(), projection_name.clone()))
                    .unwrap_or_default();

                let mut projection = ProjectionInfo::new(
                    schema_name,
                    projection_name,
                    r.get_string("anchor_table_name").unwrap_or_default(),
                )
                .with_sort_order(sort_order)
                .with_segmentation(
                    r.get_bool("is_segmented").unwrap_or(false),
                    r.get_string("segment_expression"),
                )
                .with_flags(
                    r.get_bool("is_super_projection").unwrap_or(false),
                    r.get_bool("is_up_to_date").unwrap_or(false),
                    r.get_bool("has_statistics").unwrap_or(false),
                );
                if let Some(epoch) = r.get_u64("created_epoch") {
                    projection = projection.with_created_epoch(epoch);
                }
                if let Some(k) = r.get_u64("verified_fault_tolerance") {
                    projection = projection.with_fault_tolerance(k);
                }
                projection
            })
            .collect())
    }

    /// Read a table's columns in declaration order.
    ///
    /// Names are matched case-insensitively. Without a schema, a table found in
    /// several schemas resolves to `public`, else to the first schema by name.
    /// Returns the resolved schema with the columns; an empty list means the
    /// table does not exist.
    pub async fn describe_columns(
        backend: &dyn QueryBackend,
        table: &str,
        schema: Option<&str>,
    ) -> DbResult<(Option<String>, Vec<ColumnInfo>)> {
        validate_identifier("table_name", table)?;
        let mut sql = format!(
            "{} AND LOWER(c.table_name) = LOWER({})",
            queries::DESCRIBE_COLUMNS,
            quote_literal(table)
        );
        if let Some(schema) = schema {
            validate_identifier("schema_name", schema)?;
            sql.push_str(&format!(
                " AND LOWER(c.table_schema) = LOWER({})",
                quote_literal(schema)
            ));
        }
        sql.push_str(" ORDER BY c.table_schema, c.ordinal_position");

        let result = fetch_catalog(backend, &sql).await?;

        let mut by_schema: Vec<(String, Vec<ColumnInfo>)> = Vec::new();
        for r in result.records() {
            let table_schema = r.get_string("table_schema").unwrap_or_default();
            let position = r.get_u64("ordinal_position").unwrap_or_default();
            let mut column = ColumnInfo::new(
                r.get_string("column_name").unwrap_or_default(),
                r.get_string("data_type").unwrap_or_default(),
                r.get_bool("is_nullable").unwrap_or(true),
                position,
            )
            .with_precision(r.get_u64("numeric_precision"), r.get_u64("numeric_scale"));
            if let Some(length) = r.get_u64("data_type_length") {
                column = column.with_length(length);
            }
            if let Some(default) = r.get_string("column_default") {
                column = column.with_default(default);
            }

            match by_schema.iter_mut().find(|(s, _)| *s == table_schema) {
                Some((_, columns)) => columns.push(column),
                None => by_schema.push((table_schema, vec![column])),
            }
        }

        if by_schema.is_empty() {
            return Ok((None, Vec::new()));
        }
        let chosen = by_schema
            .iter()
            .position(|(s, _)| s.eq_ignore_ascii_case(DEFAULT_SCHEMA))
            .unwrap_or(0);
        let (resolved_schema, mut columns) = by_schema.swap_remove(chosen);
        columns.sort_by_key(|c| c.ordinal_position);

        debug!(
            table = %table,
            schema = %resolved_schema,
            columns = columns.len(),
            "Described table"
        );
        Ok((Some(resolved_schema), columns))
    }
}

/// Reject identifiers that cannot name a catalog object.
pub fn validate_identifier(field: &str, value: &str) -> DbResult<()> {
    if value.trim().is_empty() {
        return Err(DbError::invalid_input(format!("{field} must not be empty")));
    }
    if value.chars().any(char::is_control) {
        return Err(DbError::invalid_input(format!(
            "{field} must not contain control characters"
        )));
    }
    if value.chars().count() > MAX_IDENTIFIER_LEN {
        return Err(DbError::invalid_input(format!(
            "{field} exceeds {MAX_IDENTIFIER_LEN} characters"
        )));
    }
    Ok(())
}

/// Render a string as a SQL literal, doubling embedded quotes.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn with_filter(
    base: &str,
    column: &str,
    schema: Option<&str>,
    order_by: &str,
) -> DbResult<String> {
    let mut sql = base.trim_end().to_string();
    if let Some(schema) = schema {
        validate_identifier("schema_name", schema)?;
        sql.push_str(&format!(" AND LOWER({column}) = LOWER({})", quote_literal(schema)));
    }
    sql.push_str(&format!(" ORDER BY {order_by}"));
    Ok(sql)
}

// =============================================================================
// SQL Query Templates
// =============================================================================
//
// Each query ends in a WHERE clause so filters can be appended with AND.

mod queries {
    /// Row estimate: largest per-projection total (buddy projections hold copies).
    pub const LIST_TABLES: &str = r#"
        SELECT
            t.table_schema,
            t.table_name,
            CASE
                WHEN t.is_temp_table THEN 'TEMPORARY TABLE'
                WHEN t.is_flextable THEN 'FLEX TABLE'
                ELSE 'TABLE'
            END AS table_type,
            ps.row_count AS estimated_row_count,
            ps.used_bytes AS storage_bytes,
            cm.comment
        FROM v_catalog.tables t
        LEFT JOIN (
            SELECT
                anchor_table_schema,
                anchor_table_name,
                MAX(projection_rows) AS row_count,
                SUM(projection_bytes) AS used_bytes
            FROM (
                SELECT
                    anchor_table_schema,
                    anchor_table_name,
                    projection_name,
                    SUM(row_count) AS projection_rows,
                    SUM(used_bytes) AS projection_bytes
                FROM v_monitor.projection_storage
                GROUP BY anchor_table_schema, anchor_table_name, projection_name
            ) per_projection
            GROUP BY anchor_table_schema, anchor_table_name
        ) ps
            ON ps.anchor_table_schema = t.table_schema
            AND ps.anchor_table_name = t.table_name
        LEFT JOIN v_catalog.comments cm
            ON cm.object_type = 'TABLE'
            AND cm.object_schema = t.table_schema
            AND cm.object_name = t.table_name
        WHERE NOT t.is_system_table
        "#;

    pub const LIST_VIEWS: &str = r#"
        SELECT
            v.table_schema,
            v.table_name,
            v.view_definition,
            cm.comment
        FROM v_catalog.views v
        LEFT JOIN v_catalog.comments cm
            ON cm.object_type = 'VIEW'
            AND cm.object_schema = v.table_schema
            AND cm.object_name = v.table_name
        WHERE NOT v.is_system_view
        "#;

    pub const LIST_PROJECTIONS: &str = r#"
        SELECT
            p.projection_schema,
            p.projection_name,
            p.anchor_table_name,
            p.is_segmented,
            p.segment_expression,
            p.is_super_projection,
            p.is_up_to_date,
            p.has_statistics,
            p.created_epoch,
            p.verified_fault_tolerance
        FROM v_catalog.projections p
        WHERE p.owner_name <> 'release'
            AND p.projection_schema NOT IN ('v_catalog', 'v_monitor', 'v_internal')
        "#;

    pub const PROJECTION_SORT_COLUMNS: &str = r#"
        SELECT
            pc.table_schema,
            pc.projection_name,
            pc.table_column_name,
            pc.sort_position
        FROM v_catalog.projection_columns pc
        WHERE pc.sort_position IS NOT NULL
        "#;

    pub const DESCRIBE_COLUMNS: &str = r#"
        SELECT
            c.table_schema,
            c.column_name,
            c.data_type,
            c.data_type_length,
            c.numeric_precision,
            c.numeric_scale,
            c.is_nullable,
            c.column_default,
            c.ordinal_position
        FROM v_catalog.columns c
        WHERE 1 = 1"#;
}
