//! The opaque SQL-engine seam.
//!
//! The storage core treats the dialect as a black box: statements are
//! assembled as text (see [`writer`](crate::writer)) and handed to a
//! [`SqlEngine`], which also answers the two dialect questions the writer
//! needs (`is_keyword`, `quote_identifier`). [`MemoryEngine`] is the
//! reference implementation: it executes the statement shapes the
//! serializer emits against in-memory tables, which is what the round-trip
//! tests run on.

use std::collections::BTreeMap;

use tempo_types::TypeError;

use crate::error::{SqlError, SqlResult};

/// Engine-assigned identifier of an affected row (or affected-row count for
/// update/delete, dialect permitting).
pub type RowId = i64;

/// One result row: column name to cell text, `None` for SQL NULL.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Row {
    cells: BTreeMap<String, Option<String>>,
}

impl Row {
    pub fn set(&mut self, column: impl Into<String>, value: Option<String>) {
        self.cells.insert(column.into(), value);
    }

    /// The cell for `column`: `None` if the column is absent, `Some(None)`
    /// for SQL NULL.
    pub fn get(&self, column: &str) -> Option<&Option<String>> {
        self.cells.get(column)
    }

    /// Non-null cell text for `column`, if present.
    pub fn text(&self, column: &str) -> Option<&str> {
        self.cells.get(column).and_then(|c| c.as_deref())
    }
}

/// Rows produced by `execute_select`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    pub rows: Vec<Row>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Narrow primitive surface of a relational engine.
///
/// Mutating statements take `&mut self`; queries are read-only. All
/// statement text is opaque to the engine's caller — only the writer knows
/// how it was assembled, only the engine knows how it executes.
pub trait SqlEngine: Send {
    /// Execute an INSERT, returning the engine's row identifier.
    fn execute_insert(&mut self, sql: &str) -> SqlResult<RowId>;

    /// Execute an UPDATE (or a DDL statement), returning the affected count.
    fn execute_update(&mut self, sql: &str) -> SqlResult<RowId>;

    /// Execute a DELETE, returning the affected count.
    fn execute_delete(&mut self, sql: &str) -> SqlResult<RowId>;

    /// Execute a SELECT.
    fn execute_select(&self, sql: &str) -> SqlResult<ResultSet>;

    /// Open an engine-level transaction.
    fn begin(&mut self) -> SqlResult<()>;

    /// Commit the open transaction.
    fn commit(&mut self) -> SqlResult<()>;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> SqlResult<()>;

    /// Returns `true` if `word` is reserved in this dialect.
    fn is_keyword(&self, word: &str) -> bool;

    /// Quote `name` for use as an identifier in this dialect.
    fn quote_identifier(&self, name: &str) -> String;
}

// ---------------------------------------------------------------------------
// In-memory reference engine
// ---------------------------------------------------------------------------

const KEYWORDS: &[&str] = &[
    "and", "create", "delete", "end", "from", "group", "index", "insert", "into", "key", "not",
    "null", "or", "order", "primary", "select", "set", "table", "update", "user", "values",
    "where",
];

/// An in-memory [`SqlEngine`] executing the statement shapes the serializer
/// emits: CREATE TABLE, single-row INSERT, UPDATE/DELETE/SELECT with an
/// optional single-column WHERE equality.
///
/// Transactions snapshot all tables at `begin`. Malformed statements fail
/// with [`TypeError::Parse`] carrying the statement text and the byte
/// offset where parsing stopped.
#[derive(Debug, Default)]
pub struct MemoryEngine {
    tables: BTreeMap<String, Vec<Row>>,
    snapshot: Option<BTreeMap<String, Vec<Row>>>,
    next_row_id: RowId,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the tables created so far.
    pub fn table_names(&self) -> Vec<String> {
        self.tables.keys().cloned().collect()
    }

    /// Number of rows in `table` (0 if the table does not exist).
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map(Vec::len).unwrap_or(0)
    }

    fn table_mut(&mut self, name: &str) -> SqlResult<&mut Vec<Row>> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| SqlError::UnknownTable(name.to_string()))
    }
}

impl SqlEngine for MemoryEngine {
    fn execute_insert(&mut self, sql: &str) -> SqlResult<RowId> {
        let mut lx = Lexer::new(sql);
        lx.expect_keyword("INSERT")?;
        lx.expect_keyword("INTO")?;
        let table = lx.ident()?;

        lx.expect_punct('(')?;
        let mut columns = vec![lx.ident()?];
        while lx.try_punct(',') {
            columns.push(lx.ident()?);
        }
        lx.expect_punct(')')?;

        lx.expect_keyword("VALUES")?;
        lx.expect_punct('(')?;
        let mut values = vec![lx.value()?];
        while lx.try_punct(',') {
            values.push(lx.value()?);
        }
        lx.expect_punct(')')?;
        lx.expect_end()?;

        if columns.len() != values.len() {
            return Err(lx.error("column and value counts differ"));
        }
        let mut row = Row::default();
        for (column, value) in columns.into_iter().zip(values) {
            row.set(column, value);
        }
        self.table_mut(&table)?.push(row);
        self.next_row_id += 1;
        Ok(self.next_row_id)
    }

    fn execute_update(&mut self, sql: &str) -> SqlResult<RowId> {
        let mut lx = Lexer::new(sql);
        if lx.try_keyword("CREATE") {
            lx.expect_keyword("TABLE")?;
            let table = lx.ident()?;
            lx.skip_parenthesized()?;
            lx.expect_end()?;
            self.tables.entry(table).or_default();
            return Ok(0);
        }

        lx.expect_keyword("UPDATE")?;
        let table = lx.ident()?;
        lx.expect_keyword("SET")?;
        let mut assignments = Vec::new();
        loop {
            let column = lx.ident()?;
            lx.expect_punct('=')?;
            assignments.push((column, lx.value()?));
            if !lx.try_punct(',') {
                break;
            }
        }
        let filter = lx.where_clause()?;
        lx.expect_end()?;

        let rows = self.table_mut(&table)?;
        let mut affected = 0;
        for row in rows.iter_mut().filter(|row| filter.matches(row)) {
            for (column, value) in &assignments {
                row.set(column.clone(), value.clone());
            }
            affected += 1;
        }
        Ok(affected)
    }

    fn execute_delete(&mut self, sql: &str) -> SqlResult<RowId> {
        let mut lx = Lexer::new(sql);
        lx.expect_keyword("DELETE")?;
        lx.expect_keyword("FROM")?;
        let table = lx.ident()?;
        let filter = lx.where_clause()?;
        lx.expect_end()?;

        let rows = self.table_mut(&table)?;
        let before = rows.len();
        rows.retain(|row| !filter.matches(row));
        Ok((before - rows.len()) as RowId)
    }

    fn execute_select(&self, sql: &str) -> SqlResult<ResultSet> {
        let mut lx = Lexer::new(sql);
        lx.expect_keyword("SELECT")?;
        lx.expect_punct('*')?;
        lx.expect_keyword("FROM")?;
        let table = lx.ident()?;
        let filter = lx.where_clause()?;
        lx.expect_end()?;

        let rows = self
            .tables
            .get(&table)
            .ok_or_else(|| SqlError::UnknownTable(table.clone()))?;
        Ok(ResultSet {
            rows: rows
                .iter()
                .filter(|row| filter.matches(row))
                .cloned()
                .collect(),
        })
    }

    fn begin(&mut self) -> SqlResult<()> {
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    fn commit(&mut self) -> SqlResult<()> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> SqlResult<()> {
        if let Some(snapshot) = self.snapshot.take() {
            self.tables = snapshot;
        }
        Ok(())
    }

    fn is_keyword(&self, word: &str) -> bool {
        KEYWORDS
            .iter()
            .any(|kw| kw.eq_ignore_ascii_case(word))
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

// ---------------------------------------------------------------------------
// Statement lexer
// ---------------------------------------------------------------------------

/// Optional single-column equality filter from a WHERE clause.
struct Filter {
    condition: Option<(String, Option<String>)>,
}

impl Filter {
    fn matches(&self, row: &Row) -> bool {
        match &self.condition {
            None => true,
            // Equality against NULL never matches, as in SQL.
            Some((_, None)) => false,
            Some((column, value)) => row.get(column) == Some(value),
        }
    }
}

struct Lexer<'a> {
    sql: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(sql: &'a str) -> Self {
        Self { sql, pos: 0 }
    }

    fn error(&self, reason: impl Into<String>) -> SqlError {
        TypeError::parse(self.sql, self.pos, reason).into()
    }

    fn rest(&self) -> &'a str {
        &self.sql[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.sql.len() - trimmed.len();
    }

    fn try_keyword(&mut self, keyword: &str) -> bool {
        self.skip_ws();
        let rest = self.rest();
        if rest.len() < keyword.len() || !rest[..keyword.len()].eq_ignore_ascii_case(keyword) {
            return false;
        }
        let next = rest[keyword.len()..].chars().next();
        if next.is_some_and(|c| c.is_ascii_alphanumeric() || c == '_') {
            return false;
        }
        self.pos += keyword.len();
        true
    }

    fn expect_keyword(&mut self, keyword: &str) -> SqlResult<()> {
        if self.try_keyword(keyword) {
            Ok(())
        } else {
            Err(self.error(format!("expected {keyword}")))
        }
    }

    fn try_punct(&mut self, punct: char) -> bool {
        self.skip_ws();
        if self.rest().starts_with(punct) {
            self.pos += punct.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, punct: char) -> SqlResult<()> {
        if self.try_punct(punct) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{punct}'")))
        }
    }

    /// Bare or double-quoted identifier ("" doubles inside quotes).
    fn ident(&mut self) -> SqlResult<String> {
        self.skip_ws();
        let rest = self.rest();
        if let Some(inner) = rest.strip_prefix('"') {
            let mut out = String::new();
            let mut chars = inner.char_indices().peekable();
            while let Some((i, c)) = chars.next() {
                if c == '"' {
                    if chars.peek().map(|&(_, c)| c) == Some('"') {
                        out.push('"');
                        chars.next();
                        continue;
                    }
                    self.pos += 1 + i + 1;
                    return Ok(out);
                }
                out.push(c);
            }
            return Err(self.error("unterminated quoted identifier"));
        }

        let taken: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        if taken.is_empty() || taken.starts_with(|c: char| c.is_ascii_digit()) {
            return Err(self.error("expected identifier"));
        }
        self.pos += taken.len();
        Ok(taken)
    }

    /// A literal value: single-quoted string ('' doubles), NULL, or a bare
    /// number. Returned as cell text (`None` for NULL).
    fn value(&mut self) -> SqlResult<Option<String>> {
        if self.try_keyword("NULL") {
            return Ok(None);
        }
        self.skip_ws();
        let rest = self.rest();
        if let Some(inner) = rest.strip_prefix('\'') {
            let mut out = String::new();
            let mut chars = inner.char_indices().peekable();
            while let Some((i, c)) = chars.next() {
                if c == '\'' {
                    if chars.peek().map(|&(_, c)| c) == Some('\'') {
                        out.push('\'');
                        chars.next();
                        continue;
                    }
                    self.pos += 1 + i + 1;
                    return Ok(Some(out));
                }
                out.push(c);
            }
            return Err(self.error("unterminated string literal"));
        }

        let taken: String = rest
            .chars()
            .take_while(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E'))
            .collect();
        if taken.is_empty() {
            return Err(self.error("expected value"));
        }
        self.pos += taken.len();
        Ok(Some(taken))
    }

    /// `WHERE column = value`, or nothing.
    fn where_clause(&mut self) -> SqlResult<Filter> {
        if !self.try_keyword("WHERE") {
            return Ok(Filter { condition: None });
        }
        let column = self.ident()?;
        self.expect_punct('=')?;
        let value = self.value()?;
        Ok(Filter {
            condition: Some((column, value)),
        })
    }

    /// Swallow a balanced parenthesized group (DDL column lists; no nested
    /// string literals expected).
    fn skip_parenthesized(&mut self) -> SqlResult<()> {
        self.expect_punct('(')?;
        let mut depth = 1usize;
        for (i, c) in self.rest().char_indices() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        self.pos += i + 1;
                        return Ok(());
                    }
                }
                _ => {}
            }
        }
        Err(self.error("unbalanced parentheses"))
    }

    fn expect_end(&mut self) -> SqlResult<()> {
        let _ = self.try_punct(';');
        self.skip_ws();
        if self.pos == self.sql.len() {
            Ok(())
        } else {
            Err(self.error("trailing input"))
        }
    }
}
