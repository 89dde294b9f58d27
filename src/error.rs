//! Error types for the Vertica MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Each error variant carries a message an AI assistant can act on; none of them
//! are retried automatically.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Statement not allowed: {keyword}. Only SELECT, DESCRIBE and EXPLAIN statements can be run")]
    DisallowedStatement { keyword: String },

    #[error("Multiple statements are not allowed: remove the ';' separators and send one statement")]
    MultiStatementRejected,

    #[error("Access to {kind} '{object}' is not permitted by the configured whitelist")]
    WhitelistViolation { kind: String, object: String },

    #[error("Query failed: {message}")]
    UpstreamQuery {
        message: String,
        /// e.g., "42V01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid arguments: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an error for a statement whose leading keyword is not accepted.
    pub fn disallowed_statement(keyword: impl Into<String>) -> Self {
        Self::DisallowedStatement {
            keyword: keyword.into(),
        }
    }

    pub fn multi_statement_rejected() -> Self {
        Self::MultiStatementRejected
    }

    /// Create a whitelist violation for a table or column.
    pub fn whitelist_violation(kind: impl Into<String>, object: impl Into<String>) -> Self {
        Self::WhitelistViolation {
            kind: kind.into(),
            object: object.into(),
        }
    }

    /// Create an error for a failure reported by the database.
    pub fn upstream_query(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::UpstreamQuery {
            message: message.into(),
            sql_state,
        }
    }

    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::DisallowedStatement { .. } => {
                Some("Rewrite the request as a SELECT, DESCRIBE or EXPLAIN statement")
            }
            Self::WhitelistViolation { .. } => {
                Some("Call list_tables to see the tables and columns that can be queried")
            }
            Self::UpstreamQuery { .. } => Some("Check the SQL syntax and referenced objects"),
            Self::UnknownTool { .. } => Some("Call tools/list to get the supported tool names"),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// Server-reported failures become `UpstreamQuery` with the original message;
/// everything on the transport side is a connection problem.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::upstream_query(db_err.message(), code)
            }
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::PoolTimedOut => DbError::connection(
                "Timed out waiting for a database connection",
                "Check that the Vertica server is running and accessible",
            ),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Restart the server")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Build suggestion data as JSON value.
fn suggestion_data(suggestion: Option<&str>) -> Option<serde_json::Value> {
    suggestion.map(|s| serde_json::json!({ "suggestion": s }))
}

/// Convert DbError to MCP ErrorData for semantic error categorization.
/// Includes the suggestion field in the `data` object when available.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        let data = suggestion_data(err.suggestion());
        match &err {
            // Caller-correctable failures -> invalid_params
            DbError::DisallowedStatement { .. }
            | DbError::MultiStatementRejected
            | DbError::WhitelistViolation { .. }
            | DbError::InvalidInput { .. } => rmcp::ErrorData::invalid_params(err.to_string(), data),

            // Upstream errors -> invalid_params with sql_state in message
            DbError::UpstreamQuery { message, sql_state } => {
                let msg = match sql_state {
                    Some(code) => format!("Query failed: {} (SQLSTATE: {})", message, code),
                    None => format!("Query failed: {}", message),
                };
                rmcp::ErrorData::invalid_params(msg, data)
            }

            DbError::UnknownTool { .. } => rmcp::ErrorData::resource_not_found(err.to_string(), data),

            DbError::Connection { .. } | DbError::Internal { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), data)
            }
        }
    }
}
