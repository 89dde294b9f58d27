//! Sample query generation.
//!
//! Implements `generate_sample_queries`: a handful of ready-to-run statements
//! for exploring one table, chosen from its column types.

use crate::error::DbResult;
use crate::models::{ColumnInfo, SampleQuery, TypeFamily};
use crate::tools::schema::{DescribeTableInput, SchemaToolHandler};
use crate::tools::sql_guard::is_reserved;
use schemars::JsonSchema;
use serde::Serialize;
use tracing::info;

/// Columns that get a per-column query.
const SAMPLED_COLUMNS: usize = 5;

pub type SampleQueriesInput = DescribeTableInput;

/// Output from the generate_sample_queries tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SampleQueriesOutput {
    pub schema_name: String,
    pub table_name: String,
    pub queries: Vec<SampleQuery>,
    pub count: usize,
}

/// Handler for sample query generation.
pub struct SampleQueryToolHandler<'a> {
    schema: &'a SchemaToolHandler,
}

impl<'a> SampleQueryToolHandler<'a> {
    pub fn new(schema: &'a SchemaToolHandler) -> Self {
        Self { schema }
    }

    pub async fn generate(&self, input: SampleQueriesInput) -> DbResult<SampleQueriesOutput> {
        let (schema, table) = input.target()?;
        let (schema_name, columns) = self
            .schema
            .resolve_columns(schema.as_deref(), &table)
            .await?;

        let queries = sample_queries(&schema_name, &table, &columns);
        info!(table = %table, count = queries.len(), "Generated sample queries");
        Ok(SampleQueriesOutput {
            schema_name,
            table_name: table,
            count: queries.len(),
            queries,
        })
    }
}

/// Build the sample statements for a table.
pub fn sample_queries(schema: &str, table: &str, columns: &[ColumnInfo]) -> Vec<SampleQuery> {
    let target = format!("{}.{}", quote_ident(schema), quote_ident(table));
    let mut queries = vec![
        SampleQuery::new(
            format!("Preview rows from {table}"),
            format!("SELECT * FROM {target} LIMIT 10"),
        ),
        SampleQuery::new(
            format!("Count rows in {table}"),
            format!("SELECT COUNT(*) AS row_count FROM {target}"),
        ),
    ];

    for column in columns.iter().take(SAMPLED_COLUMNS) {
        let name = &column.column_name;
        let col = quote_ident(name);
        let query = match column.type_family() {
            TypeFamily::Character => SampleQuery::new(
                format!("Distinct values of {name}"),
                format!(
                    "SELECT DISTINCT {col} FROM {target} WHERE {col} IS NOT NULL ORDER BY {col} LIMIT 20"
                ),
            ),
            TypeFamily::Numeric => SampleQuery::new(
                format!("Range and average of {name}"),
                format!(
                    "SELECT MIN({col}) AS min_value, MAX({col}) AS max_value, AVG({col}) AS avg_value FROM {target}"
                ),
            ),
            TypeFamily::Temporal => SampleQuery::new(
                format!("Earliest and latest {name}"),
                format!(
                    "SELECT MIN({col}) AS earliest, MAX({col}) AS latest FROM {target}"
                ),
            ),
            TypeFamily::Other => continue,
        };
        queries.push(query);
    }
    queries
}

/// Quote an identifier unless it is a plain lower-case word.
fn quote_ident(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '$')
        && !is_reserved(name);
    if plain {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
