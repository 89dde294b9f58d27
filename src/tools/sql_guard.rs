//! SQL guard for read-only statements.
//!
//! Every statement that reaches Vertica passes through [`SqlGuard`]. The guard
//! works on the token stream produced by sqlparser's tokenizer rather than on a
//! parse tree: Vertica syntax (projections, `TIMESERIES`, `MINUS`, ...) is wider
//! than any dialect sqlparser parses, while tokenizing is dialect-agnostic
//! enough to tell literals, quoted identifiers and comments apart from code.
//!
//! The guard:
//! - accepts SELECT (optionally parenthesized), WITH ... SELECT, DESCRIBE/DESC
//!   and EXPLAIN of any of those
//! - rejects more than one statement
//! - checks referenced tables and columns against the configured whitelist
//! - appends a row limit to SELECT statements that have none at top level
//!
//! The whitelist check is textual and best-effort; it does not resolve views
//! or column provenance through subqueries.

use crate::error::{DbError, DbResult};
use crate::models::Whitelist;
use serde::Serialize;
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Keywords that change data or schema; rejected anywhere in a statement.
const DATA_MODIFYING: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "MERGE", "TRUNCATE", "DROP", "CREATE", "ALTER", "COPY",
    "GRANT", "REVOKE", "INTO",
];

/// Options that may sit between EXPLAIN and the explained statement.
const EXPLAIN_MODIFIERS: &[&str] = &["LOCAL", "VERBOSE", "JSON", "ANNOTATED", "GRAPH_ONLY"];

/// Functions whose argument syntax uses FROM without naming a table.
const FROM_FUNCTIONS: &[&str] = &["EXTRACT", "SUBSTRING", "TRIM", "OVERLAY", "POSITION"];

/// Functions whose first argument is a bare date part.
const DATE_PART_FUNCTIONS: &[&str] = &[
    "EXTRACT",
    "DATEADD",
    "DATEDIFF",
    "TIMESTAMPADD",
    "TIMESTAMPDIFF",
    "TIMESTAMP_ROUND",
    "TIMESTAMP_TRUNC",
];

/// Keywords that end a FROM list.
const FROM_TERMINATORS: &[&str] = &[
    "SELECT", "WHERE", "GROUP", "ORDER", "HAVING", "LIMIT", "OFFSET", "UNION", "INTERSECT",
    "EXCEPT", "MINUS", "WINDOW", "TIMESERIES", "MATCH",
];

/// Words never taken as a table alias or a column reference.
const RESERVED: &[&str] = &[
    "ALL", "AND", "ANTI", "ANY", "AS", "ASC", "AT", "BETWEEN", "BOTH", "BY", "CASE", "CAST",
    "CROSS", "CUBE", "CURRENT", "CURRENT_DATE", "CURRENT_TIME", "CURRENT_TIMESTAMP",
    "CURRENT_USER", "DESC", "DESCRIBE", "DISTINCT", "ELSE", "END", "EPOCH", "ESCAPE", "EXCEPT",
    "EXISTS", "EXPLAIN", "FALSE", "FILTER", "FIRST", "FOLLOWING", "FOR", "FROM", "FULL", "GROUP",
    "GROUPING", "HAVING", "ILIKE", "IN", "INNER", "INTERSECT", "INTERVAL", "INTO", "IS", "JOIN",
    "LAST", "LATERAL", "LATEST", "LEADING", "LEFT", "LIKE", "LIMIT", "LOCALTIME",
    "LOCALTIMESTAMP", "MATCH", "MINUS", "NATURAL", "NOT", "NULL", "NULLS", "OFFSET", "ON",
    "ONLY", "OR", "ORDER", "OUTER", "OVER", "PARTITION", "PRECEDING", "RANGE", "RECURSIVE",
    "RIGHT", "ROLLUP", "ROW", "ROWS", "SELECT", "SEMI", "SESSION_USER", "SETS", "SOME",
    "SYSDATE", "TABLE", "TABLESAMPLE", "THEN", "TIMESERIES", "TRAILING", "TRUE", "UNBOUNDED",
    "UNION", "USER", "USING", "WHEN", "WHERE", "WINDOW", "WITH", "WITHIN",
];

pub(crate) fn is_reserved(word: &str) -> bool {
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(word))
}

/// Statement class accepted by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Select,
    Describe,
    Explain,
}

/// A statement that passed the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedQuery {
    /// Statement text without comments, outer whitespace or trailing `;`
    pub sql: String,
    pub kind: StatementKind,
    /// Whether a top-level LIMIT clause is present
    pub has_limit: bool,
}

impl GuardedQuery {
    /// Statement text with ` LIMIT n` appended when it is a SELECT without one.
    pub fn with_limit(&self, limit: u32) -> String {
        if self.needs_limit() {
            format!("{} LIMIT {}", self.sql, limit)
        } else {
            self.sql.clone()
        }
    }

    fn needs_limit(&self) -> bool {
        self.kind == StatementKind::Select && !self.has_limit
    }

    fn limited(self, limit: u32) -> Self {
        let sql = self.with_limit(limit);
        Self {
            has_limit: self.has_limit || self.kind == StatementKind::Select,
            sql,
            kind: self.kind,
        }
    }
}

/// Validates statements against the read-only policy and the whitelist.
#[derive(Debug, Clone)]
pub struct SqlGuard {
    default_limit: u32,
    whitelist: Whitelist,
}

impl SqlGuard {
    pub fn new(default_limit: u32, whitelist: Whitelist) -> Self {
        Self {
            default_limit: default_limit.max(1),
            whitelist,
        }
    }

    pub fn default_limit(&self) -> u32 {
        self.default_limit
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    /// Classify and check a statement without adding a limit.
    pub fn validate(&self, sql: &str) -> DbResult<GuardedQuery> {
        let all = Tokenizer::new(&PostgreSqlDialect {}, sql)
            .with_unescape(false)
            .tokenize()
            .map_err(|e| DbError::invalid_input(format!("Malformed SQL: {e}")))?;

        let mut significant: Vec<(usize, &Token)> = all
            .iter()
            .enumerate()
            .filter(|(_, t)| !matches!(t, Token::Whitespace(_) | Token::EOF))
            .collect();
        while matches!(significant.last(), Some((_, Token::SemiColon))) {
            significant.pop();
        }
        let Some(&(last, _)) = significant.last() else {
            return Err(DbError::invalid_input("SQL text is empty"));
        };
        if significant.iter().any(|(_, t)| matches!(t, Token::SemiColon)) {
            return Err(DbError::multi_statement_rejected());
        }

        let tokens: Vec<&Token> = significant.iter().map(|(_, t)| *t).collect();
        let (kind, body) = classify(&tokens, 0)?;
        let body = &tokens[body..];
        let has_limit = has_top_level_limit(body);

        if self.whitelist.restricts_tables() || self.whitelist.restricts_columns() {
            let refs = References::collect(body);
            self.check_tables(&refs)?;
            if self.whitelist.restricts_columns() {
                refs.check_columns(body, &self.whitelist)?;
            }
        }

        let normalized = render(&all[..=last]);
        debug!(kind = ?kind, has_limit, "Statement accepted");
        Ok(GuardedQuery {
            sql: normalized,
            kind,
            has_limit,
        })
    }

    /// Validate, then append the configured default limit where needed.
    pub fn guard(&self, sql: &str) -> DbResult<GuardedQuery> {
        Ok(self.validate(sql)?.limited(self.default_limit))
    }

    fn check_tables(&self, refs: &References) -> DbResult<()> {
        if !self.whitelist.restricts_tables() {
            return Ok(());
        }
        for table in &refs.tables {
            if refs.names_cte(table) {
                continue;
            }
            if !self
                .whitelist
                .permits_table(table.schema.as_deref(), &table.name)
            {
                return Err(DbError::whitelist_violation("table", table.display()));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Token Helpers
// =============================================================================

/// Upper-cased text of an unquoted word.
fn keyword(token: &Token) -> Option<String> {
    match token {
        Token::Word(w) if w.quote_style.is_none() => Some(w.value.to_uppercase()),
        _ => None,
    }
}

fn is_keyword(token: Option<&&Token>, kw: &str) -> bool {
    matches!(token, Some(Token::Word(w)) if w.quote_style.is_none() && w.value.eq_ignore_ascii_case(kw))
}

/// Rebuild statement text, replacing comments with a space.
fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        match token {
            Token::Whitespace(Whitespace::SingleLineComment { .. })
            | Token::Whitespace(Whitespace::MultiLineComment(_)) => out.push(' '),
            other => out.push_str(&other.to_string()),
        }
    }
    out.trim().to_string()
}

/// Classify the statement starting at `start`.
///
/// Returns the kind and the index where the statement that is actually run
/// begins (past EXPLAIN and its modifiers).
fn classify(tokens: &[&Token], start: usize) -> DbResult<(StatementKind, usize)> {
    let mut pos = start;
    while matches!(tokens.get(pos), Some(Token::LParen)) {
        pos += 1;
    }
    let Some(first) = tokens.get(pos) else {
        return Err(DbError::invalid_input("SQL text contains no statement"));
    };
    let parenthesized = pos > start;
    let leading = keyword(first).unwrap_or_else(|| first.to_string());

    match leading.as_str() {
        "SELECT" | "WITH" => {
            reject_data_modifying(&tokens[pos..])?;
            Ok((StatementKind::Select, start))
        }
        "DESCRIBE" | "DESC" if !parenthesized => Ok((StatementKind::Describe, pos)),
        "EXPLAIN" if !parenthesized => {
            let mut next = pos + 1;
            while tokens
                .get(next)
                .and_then(|t| keyword(t))
                .is_some_and(|k| EXPLAIN_MODIFIERS.contains(&k.as_str()))
            {
                next += 1;
            }
            if next >= tokens.len() {
                return Err(DbError::invalid_input(
                    "EXPLAIN must be followed by the statement to explain",
                ));
            }
            let (_, body) = classify(tokens, next)?;
            Ok((StatementKind::Explain, body))
        }
        _ => Err(DbError::disallowed_statement(leading)),
    }
}

fn reject_data_modifying(tokens: &[&Token]) -> DbResult<()> {
    for (i, token) in tokens.iter().enumerate() {
        let after_period = i > 0 && matches!(tokens[i - 1], Token::Period);
        if after_period {
            continue;
        }
        if let Some(kw) = keyword(token) {
            if DATA_MODIFYING.contains(&kw.as_str()) {
                return Err(DbError::disallowed_statement(kw));
            }
        }
    }
    Ok(())
}

fn has_top_level_limit(tokens: &[&Token]) -> bool {
    let mut depth = 0usize;
    for token in tokens {
        match token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Word(w) if depth == 0 && w.quote_style.is_none() => {
                if w.value.eq_ignore_ascii_case("LIMIT") {
                    return true;
                }
            }
            _ => {}
        }
    }
    false
}

// =============================================================================
// Reference Extraction
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
struct TableRef {
    schema: Option<String>,
    name: String,
    /// Token position of the name
    pos: usize,
}

impl TableRef {
    fn display(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct Frame {
    /// Keyword or function name right before the opening parenthesis
    opener: Option<String>,
    in_from: bool,
    /// Parenthesis opens a derived table in a FROM list
    derived: bool,
}

/// A common table expression defined by the leading WITH clause.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Cte {
    name: String,
    /// Positions of the parentheses around the body
    body: (usize, usize),
    /// For WITH RECURSIVE, position of the UNION closing the anchor part
    recursive_from: Option<usize>,
}

impl Cte {
    /// Whether a reference at `pos` reads this CTE rather than a table.
    fn visible_at(&self, pos: usize) -> bool {
        let (_, close) = self.body;
        pos > close || self.recursive_from.is_some_and(|u| pos > u && pos < close)
    }
}

/// Tables, CTE names and aliases found in a statement.
#[derive(Debug, Default)]
struct References {
    tables: Vec<TableRef>,
    ctes: Vec<Cte>,
    /// alias -> table it names (None for derived tables)
    table_aliases: HashMap<String, Option<String>>,
    /// Output column aliases from `expr [AS] alias`
    column_aliases: HashSet<String>,
    /// Token positions that name tables, aliases or CTEs
    non_columns: HashSet<usize>,
}

struct Scanner<'t> {
    tokens: &'t [&'t Token],
    refs: References,
}

impl References {
    fn collect(tokens: &[&Token]) -> Self {
        let mut scanner = Scanner {
            tokens,
            refs: References::default(),
        };
        scanner.scan();
        scanner.refs
    }

    /// Whether an unqualified reference reads a CTE defined before it.
    fn names_cte(&self, table: &TableRef) -> bool {
        table.schema.is_none()
            && self
                .ctes
                .iter()
                .any(|c| c.name.eq_ignore_ascii_case(&table.name) && c.visible_at(table.pos))
    }

    /// Check every column-position identifier against the column whitelist.
    fn check_columns(&self, tokens: &[&Token], whitelist: &Whitelist) -> DbResult<()> {
        let single_table = match self.tables.as_slice() {
            [only] => Some(only.name.to_lowercase()),
            _ => None,
        };

        for (i, token) in tokens.iter().enumerate() {
            let prev = i.checked_sub(1).map(|p| tokens[p]);
            match token {
                Token::Mul => {
                    let selects_all = matches!(prev, Some(Token::Comma | Token::Period))
                        || prev.and_then(keyword).is_some_and(|k| {
                            matches!(k.as_str(), "SELECT" | "DISTINCT" | "ALL")
                        });
                    if selects_all {
                        return Err(DbError::whitelist_violation("column", "*"));
                    }
                }
                Token::Word(w) => {
                    if self.non_columns.contains(&i) || !is_column_position(tokens, i) {
                        continue;
                    }
                    if self.column_aliases.contains(&w.value.to_lowercase())
                        && is_order_by_item(tokens, i)
                    {
                        continue;
                    }

                    let qualifier = match prev {
                        Some(Token::Period) => i
                            .checked_sub(2)
                            .and_then(|q| match tokens[q] {
                                Token::Word(qw) => Some(qw.value.to_lowercase()),
                                _ => None,
                            }),
                        _ => None,
                    };
                    let table = match qualifier {
                        Some(q) => match self.table_aliases.get(&q) {
                            Some(Some(table)) => Some(table.clone()),
                            _ => Some(q),
                        },
                        None => single_table.clone(),
                    };

                    if !whitelist.permits_column(table.as_deref(), &w.value) {
                        let object = match &table {
                            Some(t) => format!("{}.{}", t, w.value),
                            None => w.value.clone(),
                        };
                        return Err(DbError::whitelist_violation("column", object));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Whether the word at `i` could reference a column.
fn is_column_position(tokens: &[&Token], i: usize) -> bool {
    let Some(Token::Word(w)) = tokens.get(i) else {
        return false;
    };
    if w.quote_style.is_none() && is_reserved(&w.value) {
        return false;
    }
    let next = tokens.get(i + 1);
    if matches!(next, Some(Token::LParen | Token::Period)) {
        return false;
    }
    // typed literal: DATE '2024-01-01'
    if w.quote_style.is_none() && matches!(next, Some(Token::SingleQuotedString(_))) {
        return false;
    }
    let prev = i.checked_sub(1).map(|p| tokens[p]);
    if matches!(prev, Some(Token::DoubleColon)) {
        return false;
    }
    if is_alias_position(tokens, i) {
        return false;
    }
    // EXTRACT(YEAR FROM ...), DATEDIFF(day, ...)
    if matches!(prev, Some(Token::LParen))
        && i.checked_sub(2)
            .and_then(|p| keyword(tokens[p]))
            .is_some_and(|k| DATE_PART_FUNCTIONS.contains(&k.as_str()))
    {
        return false;
    }
    true
}

/// Whether the word at `i` introduces a column alias (`expr AS a`, `expr a`).
fn is_alias_position(tokens: &[&Token], i: usize) -> bool {
    let Some(prev) = i.checked_sub(1).map(|p| tokens[p]) else {
        return false;
    };
    match prev {
        Token::Word(pw) if pw.quote_style.is_none() => {
            let upper = pw.value.to_uppercase();
            upper == "AS" || upper == "END" || !is_reserved(&upper)
        }
        Token::Word(_) | Token::RParen | Token::Number(_, _) | Token::SingleQuotedString(_) => {
            true
        }
        _ => false,
    }
}

/// Whether the word at `i` is a whole item of a query-level ORDER BY list,
/// the only place where a bare name resolves to an output alias first.
fn is_order_by_item(tokens: &[&Token], i: usize) -> bool {
    let next = tokens.get(i + 1);
    let item_ends = match next {
        None | Some(Token::Comma | Token::RParen) => true,
        Some(t) => keyword(t).is_some_and(|k| {
            matches!(
                k.as_str(),
                "ASC" | "DESC" | "NULLS" | "LIMIT" | "OFFSET" | "UNION" | "INTERSECT" | "EXCEPT"
                    | "MINUS"
            )
        }),
    };
    if !item_ends {
        return false;
    }

    let prev = |p: usize| p.checked_sub(1).map(|q| tokens[q]);
    let mut p = i;
    match prev(p) {
        Some(Token::Comma) => {}
        Some(t) if keyword(t).as_deref() == Some("BY") => {}
        _ => return false,
    }

    // walk back over earlier list items to the BY of this list
    let mut depth = 0usize;
    while p > 0 {
        p -= 1;
        match tokens[p] {
            Token::RParen => depth += 1,
            Token::LParen if depth == 0 => return false,
            Token::LParen => depth -= 1,
            t if depth == 0 => match keyword(t).as_deref() {
                Some("BY") => {
                    return is_keyword(prev(p).as_ref(), "ORDER") && query_level(tokens, p);
                }
                Some(k) if FROM_TERMINATORS.contains(&k) || matches!(k, "FROM" | "ON") => {
                    return false;
                }
                _ => {}
            },
            _ => {}
        }
    }
    false
}

/// Whether the clause at `p` belongs to a query (the statement itself or a
/// parenthesized subquery) rather than a window or aggregate argument list.
fn query_level(tokens: &[&Token], p: usize) -> bool {
    let mut depth = 0usize;
    let mut q = p;
    while q > 0 {
        q -= 1;
        match tokens[q] {
            Token::RParen => depth += 1,
            Token::LParen if depth == 0 => {
                return tokens
                    .get(q + 1)
                    .and_then(|t| keyword(t))
                    .is_some_and(|k| k == "SELECT" || k == "WITH");
            }
            Token::LParen => depth -= 1,
            _ => {}
        }
    }
    true
}

impl Scanner<'_> {
    fn kw(&self, i: usize) -> Option<String> {
        self.tokens.get(i).and_then(|t| keyword(t))
    }

    fn scan(&mut self) {
        let mut start = 0;
        while matches!(self.tokens.get(start), Some(Token::LParen)) {
            start += 1;
        }
        match self.kw(start).as_deref() {
            Some("WITH") => self.read_ctes(start + 1),
            Some("DESCRIBE" | "DESC") => {
                let mut target = start + 1;
                if is_keyword(self.tokens.get(target), "TABLE") {
                    target += 1;
                }
                self.read_ref(target);
                return;
            }
            _ => {}
        }

        let mut frames = vec![Frame::default()];
        let mut i = 0;
        while i < self.tokens.len() {
            let in_from = frames.last().is_some_and(|f| f.in_from);
            match self.tokens[i] {
                Token::LParen => {
                    let opener = i.checked_sub(1).and_then(|p| self.kw(p));
                    let derived = in_from && i.checked_sub(1).is_some_and(|p| self.opens_ref(p));
                    frames.push(Frame {
                        opener,
                        in_from: false,
                        derived,
                    });
                    i += 1;
                }
                Token::RParen => {
                    let closed = if frames.len() > 1 { frames.pop() } else { None };
                    i += 1;
                    if closed.is_some_and(|f| f.derived) {
                        i = self.read_alias(i, None);
                    }
                }
                Token::Comma if in_from => i = self.read_ref(i + 1),
                Token::Word(w) if w.quote_style.is_none() => {
                    let kw = w.value.to_uppercase();
                    let frame = frames.last_mut();
                    match (kw.as_str(), frame) {
                        ("FROM", Some(frame))
                            if !frame
                                .opener
                                .as_deref()
                                .is_some_and(|o| FROM_FUNCTIONS.contains(&o)) =>
                        {
                            frame.in_from = true;
                            i = self.read_ref(i + 1);
                        }
                        ("JOIN", Some(frame)) => {
                            frame.in_from = true;
                            i = self.read_ref(i + 1);
                        }
                        (k, Some(frame)) if FROM_TERMINATORS.contains(&k) => {
                            frame.in_from = false;
                            i += 1;
                        }
                        _ => {
                            self.note_alias(i);
                            i += 1;
                        }
                    }
                }
                Token::Word(_) => {
                    self.note_alias(i);
                    i += 1;
                }
                _ => i += 1,
            }
        }
    }

    /// Whether the token at `p` is followed by a table reference.
    fn opens_ref(&self, p: usize) -> bool {
        matches!(self.tokens.get(p), Some(Token::Comma))
            || matches!(
                self.kw(p).as_deref(),
                Some("FROM" | "JOIN" | "LATERAL")
            )
    }

    /// Record an output column alias that ORDER BY may refer to.
    fn note_alias(&mut self, i: usize) {
        let Some(Token::Word(w)) = self.tokens.get(i) else {
            return;
        };
        let next = self.tokens.get(i + 1);
        if matches!(next, Some(Token::LParen | Token::Period)) {
            return;
        }
        if w.quote_style.is_none() && is_reserved(&w.value) {
            return;
        }
        if is_alias_position(self.tokens, i) {
            self.refs.column_aliases.insert(w.value.to_lowercase());
        }
    }

    /// Read `[LATERAL|ONLY] name[.name...] [[AS] alias]` starting at `j`.
    fn read_ref(&mut self, mut j: usize) -> usize {
        while matches!(self.kw(j).as_deref(), Some("LATERAL" | "ONLY")) {
            j += 1;
        }

        let mut parts: Vec<(usize, String)> = Vec::new();
        let mut k = j;
        while let Some(Token::Word(w)) = self.tokens.get(k).copied() {
            if parts.is_empty() && w.quote_style.is_none() && is_reserved(&w.value) {
                break;
            }
            parts.push((k, w.value.clone()));
            if matches!(self.tokens.get(k + 1), Some(Token::Period)) {
                k += 2;
            } else {
                k += 1;
                break;
            }
        }

        let Some((pos, name)) = parts.last().cloned() else {
            return j;
        };
        for (p, _) in &parts {
            self.refs.non_columns.insert(*p);
        }
        // table function: name(...)
        if matches!(self.tokens.get(k), Some(Token::LParen)) {
            return k;
        }

        let schema = parts
            .len()
            .checked_sub(2)
            .and_then(|idx| parts.get(idx))
            .map(|(_, s)| s.clone());
        let table_key = name.to_lowercase();
        self.refs.tables.push(TableRef { schema, name, pos });
        self.read_alias(k, Some(table_key))
    }

    /// Read an optional `[AS] alias [(col, ...)]` at `k`.
    fn read_alias(&mut self, mut k: usize, table: Option<String>) -> usize {
        let explicit = is_keyword(self.tokens.get(k), "AS");
        if explicit {
            k += 1;
        }
        match self.tokens.get(k) {
            Some(Token::Word(w))
                if explicit || w.quote_style.is_some() || !is_reserved(&w.value) =>
            {
                self.refs.non_columns.insert(k);
                self.refs.table_aliases.insert(w.value.to_lowercase(), table);
                k += 1;
                if matches!(self.tokens.get(k), Some(Token::LParen)) {
                    k = self.skip_name_list(k);
                }
                k
            }
            _ => k,
        }
    }

    /// Mark the words of a parenthesized name list at `k`; returns the index
    /// after the closing parenthesis.
    fn skip_name_list(&mut self, k: usize) -> usize {
        let end = self.matching_paren(k);
        for pos in k..end {
            if matches!(self.tokens.get(pos), Some(Token::Word(_))) {
                self.refs.non_columns.insert(pos);
            }
        }
        end + 1
    }

    /// Index of the parenthesis closing the one at `open`, or the token count.
    fn matching_paren(&self, open: usize) -> usize {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return i;
                    }
                }
                _ => {}
            }
        }
        self.tokens.len()
    }

    /// Collect CTE names from `WITH [RECURSIVE] name [(cols)] AS (...), ...`.
    fn read_ctes(&mut self, mut j: usize) {
        let recursive = is_keyword(self.tokens.get(j), "RECURSIVE");
        if recursive {
            j += 1;
        }
        loop {
            let Some(Token::Word(w)) = self.tokens.get(j).copied() else {
                return;
            };
            self.refs.non_columns.insert(j);
            let name = w.value.clone();
            j += 1;
            if matches!(self.tokens.get(j), Some(Token::LParen)) {
                j = self.skip_name_list(j);
            }
            if !is_keyword(self.tokens.get(j), "AS") {
                return;
            }
            j += 1;
            while matches!(self.kw(j).as_deref(), Some("MATERIALIZED" | "NOT")) {
                j += 1;
            }
            if !matches!(self.tokens.get(j), Some(Token::LParen)) {
                return;
            }
            let close = self.matching_paren(j);
            let recursive_from = if recursive {
                self.anchor_union(j, close)
            } else {
                None
            };
            self.refs.ctes.push(Cte {
                name,
                body: (j, close),
                recursive_from,
            });
            j = close + 1;
            if !matches!(self.tokens.get(j), Some(Token::Comma)) {
                return;
            }
            j += 1;
        }
    }

    /// First UNION directly inside the body parentheses `open..close`.
    fn anchor_union(&self, open: usize, close: usize) -> Option<usize> {
        let mut depth = 0usize;
        for pos in open..close {
            match self.tokens[pos] {
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                t if depth == 1 && is_keyword(Some(&t), "UNION") => return Some(pos),
                _ => {}
            }
        }
        None
    }
}
