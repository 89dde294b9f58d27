//! Vertica type mappings.
//!
//! This module maps Vertica column types onto JSON-safe values.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies a column by the type OID Vertica reports in the
//!    row description
//! 2. The value, always received in text format over the simple-query protocol,
//!    is decoded according to that category
//!
//! Vertica reuses the PostgreSQL wire protocol but not its type OIDs (for
//! instance OID 16 is NUMERIC, not BOOL), so sqlx's own type checks are bypassed
//! with `RawText`.

use crate::models::ColumnMetadata;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgRow, PgTypeInfo, PgValueRef};
use sqlx::{Column, Decode, Row, Type};

// =============================================================================
// Type Classification
// =============================================================================

/// Vertica type OIDs as sent in the row description.
pub mod oid {
    pub const BOOL: u32 = 5;
    pub const INT8: u32 = 6;
    pub const FLOAT8: u32 = 7;
    pub const CHAR: u32 = 8;
    pub const VARCHAR: u32 = 9;
    pub const DATE: u32 = 10;
    pub const TIME: u32 = 11;
    pub const TIMESTAMP: u32 = 12;
    pub const TIMESTAMPTZ: u32 = 13;
    pub const INTERVAL: u32 = 14;
    pub const INTERVAL_YM: u32 = 15;
    pub const NUMERIC: u32 = 16;
    pub const VARBINARY: u32 = 17;
    pub const UUID: u32 = 20;
    pub const LONG_VARCHAR: u32 = 115;
    pub const LONG_VARBINARY: u32 = 116;
    pub const BINARY: u32 = 117;
}

/// Logical category for Vertica column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Boolean,
    Integer,
    Float,
    Numeric,
    Temporal,
    Interval,
    Uuid,
    Text,
    Binary,
}

/// Classify a Vertica type OID. Unknown OIDs are passed through as text.
pub fn categorize_oid(type_oid: u32) -> TypeCategory {
    match type_oid {
        oid::BOOL => TypeCategory::Boolean,
        oid::INT8 => TypeCategory::Integer,
        oid::FLOAT8 => TypeCategory::Float,
        oid::NUMERIC => TypeCategory::Numeric,
        oid::DATE | oid::TIME | oid::TIMESTAMP | oid::TIMESTAMPTZ => TypeCategory::Temporal,
        oid::INTERVAL | oid::INTERVAL_YM => TypeCategory::Interval,
        oid::UUID => TypeCategory::Uuid,
        oid::VARBINARY | oid::LONG_VARBINARY | oid::BINARY => TypeCategory::Binary,
        _ => TypeCategory::Text,
    }
}

/// Display name for a Vertica type OID.
pub fn type_name(type_oid: u32) -> &'static str {
    match type_oid {
        oid::BOOL => "Boolean",
        oid::INT8 => "Integer",
        oid::FLOAT8 => "Float",
        oid::CHAR => "Char",
        oid::VARCHAR => "Varchar",
        oid::DATE => "Date",
        oid::TIME => "Time",
        oid::TIMESTAMP => "Timestamp",
        oid::TIMESTAMPTZ => "TimestampTz",
        oid::INTERVAL => "Interval",
        oid::INTERVAL_YM => "IntervalYM",
        oid::NUMERIC => "Numeric",
        oid::VARBINARY => "Varbinary",
        oid::UUID => "Uuid",
        oid::LONG_VARCHAR => "Long Varchar",
        oid::LONG_VARBINARY => "Long Varbinary",
        oid::BINARY => "Binary",
        _ => "Unknown",
    }
}

// =============================================================================
// Raw Text Support
// =============================================================================

/// Text-format column value, accepted for any wire type.
#[derive(Debug)]
pub struct RawText(pub String);

impl Type<sqlx::Postgres> for RawText {
    fn type_info() -> PgTypeInfo {
        <String as Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

impl<'r> Decode<'r, sqlx::Postgres> for RawText {
    fn decode(value: PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::Postgres>>::decode(value)?;
        Ok(RawText(s.to_string()))
    }
}

// =============================================================================
// Value Decoding
// =============================================================================

/// Convert the text form of a value into JSON according to its category.
///
/// Integers, finite floats and booleans become JSON scalars. Numerics, temporal
/// values, intervals and UUIDs stay strings so no precision or zone is lost.
pub fn decode_text_value(category: TypeCategory, text: &str) -> JsonValue {
    match category {
        TypeCategory::Boolean => match text {
            "t" | "true" | "TRUE" | "1" => JsonValue::Bool(true),
            "f" | "false" | "FALSE" | "0" => JsonValue::Bool(false),
            other => JsonValue::String(other.to_string()),
        },
        TypeCategory::Integer => text
            .parse::<i64>()
            .map(|v| JsonValue::Number(v.into()))
            .unwrap_or_else(|_| JsonValue::String(text.to_string())),
        TypeCategory::Float => text
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(JsonValue::Number)
            .unwrap_or_else(|| JsonValue::String(text.to_string())),
        TypeCategory::Binary => decode_binary_value(&unescape_binary(text)),
        TypeCategory::Numeric
        | TypeCategory::Temporal
        | TypeCategory::Interval
        | TypeCategory::Uuid
        | TypeCategory::Text => JsonValue::String(text.to_string()),
    }
}

/// Unescape the text form of a binary value.
///
/// Accepts the `\x` hex form and the escape form where non-printable bytes are
/// written as `\ooo` octal and a backslash as `\\`.
pub fn unescape_binary(text: &str) -> Vec<u8> {
    if let Some(hex) = text.strip_prefix("\\x") {
        if let Some(bytes) = decode_hex(hex) {
            return bytes;
        }
    }

    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            if bytes.get(i + 1) == Some(&b'\\') {
                out.push(b'\\');
                i += 2;
                continue;
            }
            let octal = bytes
                .get(i + 1..i + 4)
                .filter(|d| d.iter().all(|b| (b'0'..=b'7').contains(b)));
            if let Some(digits) = octal {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| hex.get(i..i + 2).and_then(|pair| u8::from_str_radix(pair, 16).ok()))
        .collect()
}

/// Encode binary data as a base64 JSON string.
pub fn decode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    JsonValue::String(STANDARD.encode(bytes))
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting database rows to JSON values.
pub trait RowToJson {
    /// Values in column order.
    fn to_json_values(&self) -> Vec<JsonValue>;
    fn column_metadata(&self) -> Vec<ColumnMetadata>;
}

fn column_oid(col: &sqlx::postgres::PgColumn) -> u32 {
    col.type_info().oid().map(|o| o.0).unwrap_or_default()
}

impl RowToJson for PgRow {
    fn to_json_values(&self) -> Vec<JsonValue> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let category = categorize_oid(column_oid(col));
                match self.try_get::<Option<RawText>, _>(idx) {
                    Ok(Some(raw)) => decode_text_value(category, &raw.0),
                    Ok(None) => JsonValue::Null,
                    Err(e) => {
                        tracing::error!(column = %col.name(), error = %e, "Failed to decode column");
                        JsonValue::Null
                    }
                }
            })
            .collect()
    }

    fn column_metadata(&self) -> Vec<ColumnMetadata> {
        self.columns()
            .iter()
            .map(|col| ColumnMetadata::new(col.name(), type_name(column_oid(col))))
            .collect()
    }
}
