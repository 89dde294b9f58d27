//! Table and column allow-lists.
//!
//! Entries are compared case-insensitively. Table entries may be bare
//! (`employees`) or schema-qualified (`public.employees`); column entries may be
//! bare (`salary`) or table-qualified (`employees.salary`). An empty list means
//! "no restriction".

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Whitelist {
    tables: Vec<String>,
    columns: Vec<String>,
}

impl Whitelist {
    /// Build a whitelist, trimming entries and dropping empty ones.
    pub fn new<T, C>(tables: T, columns: C) -> Self
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self {
            tables: normalize(tables),
            columns: normalize(columns),
        }
    }

    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn restricts_tables(&self) -> bool {
        !self.tables.is_empty()
    }

    pub fn restricts_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Check whether a table reference is allowed.
    ///
    /// The bare names must match; schemas are compared only when both the
    /// entry and the reference carry one.
    pub fn permits_table(&self, schema: Option<&str>, table: &str) -> bool {
        if self.tables.is_empty() {
            return true;
        }
        let table = table.to_lowercase();
        let schema = schema.map(str::to_lowercase);
        self.tables.iter().any(|entry| {
            let (entry_schema, entry_table) = split_qualified(entry);
            entry_table == table
                && match (entry_schema, schema.as_deref()) {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                }
        })
    }

    /// Check whether a column is allowed.
    ///
    /// `table` is the owning table when known; a table-qualified entry only
    /// matches that table, a bare entry matches the column anywhere.
    pub fn permits_column(&self, table: Option<&str>, column: &str) -> bool {
        if self.columns.is_empty() {
            return true;
        }
        let column = column.to_lowercase();
        let table = table.map(str::to_lowercase);
        self.columns.iter().any(|entry| {
            let (entry_table, entry_column) = split_qualified(entry);
            entry_column == column
                && match (entry_table, table.as_deref()) {
                    (Some(a), Some(b)) => a == b,
                    _ => true,
                }
        })
    }
}

fn normalize<I>(entries: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    entries
        .into_iter()
        .map(|e| e.as_ref().trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Split `a.b.c` into (`Some("a.b")`, `"c"`); the qualifier keeps only its last segment.
fn split_qualified(entry: &str) -> (Option<&str>, &str) {
    match entry.rsplit_once('.') {
        Some((qualifier, name)) => (qualifier.rsplit('.').next(), name),
        None => (None, entry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_whitelist_permits_everything() {
        let wl = Whitelist::unrestricted();
        assert!(wl.permits_table(None, "anything"));
        assert!(wl.permits_column(Some("t"), "c"));
        assert!(!wl.restricts_tables());
    }

    #[test]
    fn test_entries_are_trimmed_and_empty_dropped() {
        let wl = Whitelist::new([" employees ", "", "  "], Vec::<String>::new());
        assert_eq!(wl.tables(), &["employees".to_string()]);
        assert!(!wl.restricts_columns());
    }

    #[test]
    fn test_table_match_is_case_insensitive() {
        let wl = Whitelist::new(["Employees"], Vec::<&str>::new());
        assert!(wl.permits_table(None, "EMPLOYEES"));
        assert!(wl.permits_table(Some("public"), "employees"));
        assert!(!wl.permits_table(None, "departments"));
    }

    #[test]
    fn test_schema_qualified_table_entry() {
        let wl = Whitelist::new(["public.employees"], Vec::<&str>::new());
        assert!(wl.permits_table(Some("public"), "employees"));
        assert!(wl.permits_table(None, "employees"));
        assert!(!wl.permits_table(Some("staging"), "employees"));
    }

    #[test]
    fn test_column_entries() {
        let wl = Whitelist::new(Vec::<&str>::new(), ["employees.salary", "name"]);
        assert!(wl.permits_column(Some("employees"), "salary"));
        assert!(wl.permits_column(None, "SALARY"));
        assert!(!wl.permits_column(Some("payroll"), "salary"));
        assert!(wl.permits_column(Some("payroll"), "name"));
        assert!(!wl.permits_column(None, "ssn"));
    }
}
