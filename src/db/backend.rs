//! Query backend abstraction.
//!
//! Tool handlers talk to the database only through [`QueryBackend`], which keeps
//! them independent from the connection pool and lets tests run against an
//! in-memory backend.

use crate::error::DbResult;
use crate::models::QueryResult;
use futures_util::future::BoxFuture;

/// Executes one already-guarded statement.
pub trait QueryBackend: Send + Sync {
    /// Run `sql` and return at most `max_rows` rows.
    ///
    /// When the statement yields more rows, the result is cut at `max_rows` and
    /// `truncated` is set. Implementations must stop reading after
    /// `max_rows + 1` rows.
    fn fetch<'a>(&'a self, sql: &'a str, max_rows: usize) -> BoxFuture<'a, DbResult<QueryResult>>;

    /// Release the underlying connections.
    fn close(&self) -> BoxFuture<'_, ()>;
}
