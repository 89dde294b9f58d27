//! Query execution.
//!
//! Statements are sent with the simple-query protocol (no bind parameters,
//! text-format results). Row limits are enforced via streaming: at most
//! `max_rows + 1` rows are read, the extra row only signals truncation.
//!
//! An empty result carries no row description over the simple-query
//! protocol, so for SELECT statements the columns are looked up with an
//! outer join that always yields one all-NULL row.

use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{ColumnMetadata, QueryResult};
use futures_util::StreamExt;
use sqlx::PgPool;
use sqlx::postgres::PgRow;
use std::time::Instant;
use tracing::{debug, warn};

/// Run a statement and collect at most `max_rows` rows.
pub async fn fetch_rows(pool: &PgPool, sql: &str, max_rows: usize) -> DbResult<QueryResult> {
    use sqlx::Executor;

    let start = Instant::now();
    debug!(sql = %sql, max_rows, "Executing query");

    let results = pool
        .fetch(sql)
        .take(max_rows.saturating_add(1))
        .collect::<Vec<_>>()
        .await;
    let rows = collect_rows(results)?;

    let mut result = process_rows(rows, max_rows, start);
    if result.columns.is_empty() {
        if let Some(lookup) = column_lookup_sql(sql) {
            result.columns = lookup_columns(pool, &lookup).await;
        }
    }
    Ok(result)
}

/// Wrap a SELECT so it returns exactly one row with the same columns.
fn column_lookup_sql(sql: &str) -> Option<String> {
    let body = sql.trim().trim_end_matches(';').trim_end();
    let head = body.trim_start_matches('(').trim_start();
    let is_select = head
        .get(..6)
        .is_some_and(|word| word.eq_ignore_ascii_case("SELECT"));
    if !is_select {
        return None;
    }
    Some(format!(
        "SELECT q.* FROM (SELECT 1 AS one) d LEFT JOIN ({body}) q ON 1 = 1 LIMIT 1"
    ))
}

async fn lookup_columns(pool: &PgPool, lookup: &str) -> Vec<ColumnMetadata> {
    use sqlx::Executor;

    match pool.fetch_optional(lookup).await {
        Ok(Some(row)) => row.column_metadata(),
        Ok(None) => Vec::new(),
        Err(e) => {
            debug!(error = %e, "Column lookup for empty result failed");
            Vec::new()
        }
    }
}

fn collect_rows(results: Vec<Result<PgRow, sqlx::Error>>) -> DbResult<Vec<PgRow>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(DbError::from)?);
    }
    Ok(rows)
}

/// Convert fetched rows into a QueryResult, dropping the look-ahead row.
fn process_rows<R: RowToJson>(rows: Vec<R>, max_rows: usize, start: Instant) -> QueryResult {
    let execution_time_ms = start.elapsed().as_millis() as u64;

    let Some(first) = rows.first() else {
        return QueryResult::empty(execution_time_ms);
    };

    let columns = first.column_metadata();
    let truncated = rows.len() > max_rows;
    if truncated {
        warn!(limit = max_rows, "Query result truncated");
    }

    let rows = rows
        .iter()
        .take(max_rows)
        .map(RowToJson::to_json_values)
        .collect();

    QueryResult {
        columns,
        rows,
        truncated,
        execution_time_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value as JsonValue, json};

    struct FakeRow(i64);

    impl RowToJson for FakeRow {
        fn to_json_values(&self) -> Vec<JsonValue> {
            vec![json!(self.0)]
        }

        fn column_metadata(&self) -> Vec<ColumnMetadata> {
            vec![ColumnMetadata::new("n", "Integer")]
        }
    }

    #[test]
    fn test_process_rows_empty() {
        let result = process_rows(Vec::<FakeRow>::new(), 10, Instant::now());
        assert!(result.columns.is_empty());
        assert!(!result.truncated);
    }

    #[test]
    fn test_column_lookup_sql_wraps_selects() {
        assert_eq!(
            column_lookup_sql("SELECT id, label FROM events WHERE 1 = 0 LIMIT 100").as_deref(),
            Some(
                "SELECT q.* FROM (SELECT 1 AS one) d LEFT JOIN \
                 (SELECT id, label FROM events WHERE 1 = 0 LIMIT 100) q ON 1 = 1 LIMIT 1"
            )
        );
        assert!(column_lookup_sql("  select 1;").is_some());
        assert!(column_lookup_sql("(SELECT 1) UNION (SELECT 2)").is_some());
    }

    #[test]
    fn test_column_lookup_sql_skips_other_statements() {
        assert!(column_lookup_sql("DESCRIBE employees").is_none());
        assert!(column_lookup_sql("EXPLAIN SELECT 1").is_none());
        assert!(column_lookup_sql("WITH a AS (SELECT 1) SELECT * FROM a").is_none());
        assert!(column_lookup_sql("SEL").is_none());
    }

    #[test]
    fn test_process_rows_under_limit() {
        let rows = (0..3).map(FakeRow).collect();
        let result = process_rows(rows, 3, Instant::now());
        assert_eq!(result.row_count(), 3);
        assert!(!result.truncated);
        assert_eq!(result.columns[0].name, "n");
    }

    #[test]
    fn test_process_rows_drops_look_ahead_row() {
        let rows = (0..4).map(FakeRow).collect();
        let result = process_rows(rows, 3, Instant::now());
        assert_eq!(result.row_count(), 3);
        assert!(result.truncated);
        assert_eq!(result.rows[2], vec![json!(2)]);
    }
}
