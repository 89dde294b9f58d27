//! Schema-related data models.
//!
//! This module defines the shapes returned by Vertica catalog introspection.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct TableInfo {
    pub schema_name: String,
    pub table_name: String,
    pub table_type: TableType,
    /// Sum of `row_count` over the table's projections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_row_count: Option<u64>,
    /// Bytes used by the table's projections
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl TableInfo {
    /// Create a new table info.
    pub fn new(
        schema_name: impl Into<String>,
        table_name: impl Into<String>,
        table_type: TableType,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            table_name: table_name.into(),
            table_type,
            estimated_row_count: None,
            storage_bytes: None,
            comment: None,
        }
    }

    /// Set the estimated row count.
    pub fn with_row_count(mut self, row_count: u64) -> Self {
        self.estimated_row_count = Some(row_count);
        self
    }

    /// Set the storage size in bytes.
    pub fn with_storage_bytes(mut self, bytes: u64) -> Self {
        self.storage_bytes = Some(bytes);
        self
    }

    /// Set the table comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }
}

/// Kind of user table reported by `v_catalog.tables`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableType {
    Table,
    TemporaryTable,
    FlexTable,
}

impl TableType {
    /// Parse the `table_type` label produced by the catalog query.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "TEMPORARY TABLE" | "TEMPORARY_TABLE" | "TEMP" => Self::TemporaryTable,
            "FLEX TABLE" | "FLEX_TABLE" | "FLEX" => Self::FlexTable,
            _ => Self::Table,
        }
    }
}

impl std::fmt::Display for TableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "TABLE"),
            Self::TemporaryTable => write!(f, "TEMPORARY TABLE"),
            Self::FlexTable => write!(f, "FLEX TABLE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ViewInfo {
    pub schema_name: String,
    pub view_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub definition: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl ViewInfo {
    pub fn new(schema_name: impl Into<String>, view_name: impl Into<String>) -> Self {
        Self {
            schema_name: schema_name.into(),
            view_name: view_name.into(),
            definition: None,
            comment: None,
        }
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// A Vertica projection: the physical, sorted and possibly segmented storage
/// behind a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ProjectionInfo {
    pub schema_name: String,
    pub projection_name: String,
    pub anchor_table_name: String,
    /// Projection columns in sort order
    pub sort_order: Vec<String>,
    pub is_segmented: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_expression: Option<String>,
    pub is_super_projection: bool,
    pub is_up_to_date: bool,
    pub has_statistics: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_epoch: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_fault_tolerance: Option<u64>,
}

impl ProjectionInfo {
    /// Create a new projection info with every flag cleared.
    pub fn new(
        schema_name: impl Into<String>,
        projection_name: impl Into<String>,
        anchor_table_name: impl Into<String>,
    ) -> Self {
        Self {
            schema_name: schema_name.into(),
            projection_name: projection_name.into(),
            anchor_table_name: anchor_table_name.into(),
            sort_order: Vec::new(),
            is_segmented: false,
            segment_expression: None,
            is_super_projection: false,
            is_up_to_date: false,
            has_statistics: false,
            created_epoch: None,
            verified_fault_tolerance: None,
        }
    }

    pub fn with_sort_order(mut self, columns: Vec<String>) -> Self {
        self.sort_order = columns;
        self
    }

    /// Set the segmentation; an empty expression is treated as absent.
    pub fn with_segmentation(mut self, is_segmented: bool, expression: Option<String>) -> Self {
        self.is_segmented = is_segmented;
        self.segment_expression = expression.filter(|e| !e.trim().is_empty());
        self
    }

    pub fn with_flags(mut self, is_super: bool, is_up_to_date: bool, has_statistics: bool) -> Self {
        self.is_super_projection = is_super;
        self.is_up_to_date = is_up_to_date;
        self.has_statistics = has_statistics;
        self
    }

    pub fn with_created_epoch(mut self, epoch: u64) -> Self {
        self.created_epoch = Some(epoch);
        self
    }

    pub fn with_fault_tolerance(mut self, k_safety: u64) -> Self {
        self.verified_fault_tolerance = Some(k_safety);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ColumnInfo {
    pub column_name: String,
    /// Full type (e.g., `varchar(80)`, `numeric(10,2)`)
    pub data_type: String,
    pub is_nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_type_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_precision: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_scale: Option<u64>,
    /// 1-based position in the table definition
    pub ordinal_position: u64,
}

impl ColumnInfo {
    /// Create a new column definition.
    pub fn new(
        column_name: impl Into<String>,
        data_type: impl Into<String>,
        is_nullable: bool,
        ordinal_position: u64,
    ) -> Self {
        Self {
            column_name: column_name.into(),
            data_type: data_type.into(),
            is_nullable,
            column_default: None,
            data_type_length: None,
            numeric_precision: None,
            numeric_scale: None,
            ordinal_position,
        }
    }

    /// Set the default expression.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.column_default = Some(default.into());
        self
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.data_type_length = Some(length);
        self
    }

    /// Set numeric precision and scale.
    pub fn with_precision(mut self, precision: Option<u64>, scale: Option<u64>) -> Self {
        self.numeric_precision = precision;
        self.numeric_scale = scale;
        self
    }

    /// Broad family of the column type, used to pick sample queries.
    pub fn type_family(&self) -> TypeFamily {
        TypeFamily::of(&self.data_type)
    }
}

/// Coarse grouping of Vertica column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFamily {
    Character,
    Numeric,
    Temporal,
    Other,
}

impl TypeFamily {
    /// Classify a catalog type name such as `varchar(80)` or `numeric(18,2)`.
    pub fn of(data_type: &str) -> Self {
        let lower = data_type.to_lowercase();
        let base = lower
            .split('(')
            .next()
            .unwrap_or_default()
            .trim();
        match base {
            "char" | "varchar" | "long varchar" | "character" | "character varying" | "text" => {
                Self::Character
            }
            "int" | "integer" | "bigint" | "smallint" | "tinyint" | "int8" | "numeric"
            | "decimal" | "number" | "money" | "float" | "float8" | "real"
            | "double precision" => Self::Numeric,
            "date" | "time" | "timetz" | "timestamp" | "timestamptz" | "smalldatetime"
            | "datetime" => Self::Temporal,
            _ if base.starts_with("timestamp") || base.starts_with("time ") => Self::Temporal,
            _ => Self::Other,
        }
    }
}

/// One generated query for exploring a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct SampleQuery {
    pub description: String,
    pub sql: String,
}

impl SampleQuery {
    pub fn new(description: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            sql: sql.into(),
        }
    }
}
