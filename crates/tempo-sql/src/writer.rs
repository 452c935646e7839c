//! SQL text assembly.
//!
//! Statements are built as opaque text; the only dialect input is the
//! engine's `is_keyword`/`quote_identifier` pair. Identifiers we generate
//! are lowercase snake_case, so they only need quoting when they collide
//! with a reserved word.

use crate::engine::SqlEngine;

/// Render `name` as an identifier, quoting through the engine when the
/// dialect reserves it (or when it is not a plain snake_case word).
pub fn ident(engine: &dyn SqlEngine, name: &str) -> String {
    let plain = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if plain && !engine.is_keyword(name) {
        name.to_string()
    } else {
        engine.quote_identifier(name)
    }
}

/// Render a text literal, doubling embedded quotes. `None` renders NULL.
pub fn literal(value: Option<&str>) -> String {
    match value {
        Some(text) => format!("'{}'", text.replace('\'', "''")),
        None => "NULL".to_string(),
    }
}

/// `INSERT INTO table (c1, c2) VALUES (v1, v2)`
pub fn insert(
    engine: &dyn SqlEngine,
    table: &str,
    columns: &[(String, Option<String>)],
) -> String {
    let names: Vec<String> = columns.iter().map(|(name, _)| ident(engine, name)).collect();
    let values: Vec<String> = columns
        .iter()
        .map(|(_, value)| literal(value.as_deref()))
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        ident(engine, table),
        names.join(", "),
        values.join(", ")
    )
}

/// `UPDATE table SET c1 = v1, c2 = v2 WHERE key_column = key`
pub fn update(
    engine: &dyn SqlEngine,
    table: &str,
    assignments: &[(String, Option<String>)],
    key_column: &str,
    key: &str,
) -> String {
    let set: Vec<String> = assignments
        .iter()
        .map(|(name, value)| format!("{} = {}", ident(engine, name), literal(value.as_deref())))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = {}",
        ident(engine, table),
        set.join(", "),
        ident(engine, key_column),
        literal(Some(key))
    )
}

/// `DELETE FROM table WHERE key_column = key`
pub fn delete(engine: &dyn SqlEngine, table: &str, key_column: &str, key: &str) -> String {
    format!(
        "DELETE FROM {} WHERE {} = {}",
        ident(engine, table),
        ident(engine, key_column),
        literal(Some(key))
    )
}

/// `SELECT * FROM table`
pub fn select_all(engine: &dyn SqlEngine, table: &str) -> String {
    format!("SELECT * FROM {}", ident(engine, table))
}

/// `SELECT * FROM table WHERE column = value`
pub fn select_where(engine: &dyn SqlEngine, table: &str, column: &str, value: &str) -> String {
    format!(
        "SELECT * FROM {} WHERE {} = {}",
        ident(engine, table),
        ident(engine, column),
        literal(Some(value))
    )
}

#[cfg(test)]
mod tests {
    use crate::engine::MemoryEngine;

    use super::*;

    #[test]
    fn plain_identifiers_stay_bare() {
        let engine = MemoryEngine::new();
        assert_eq!(ident(&engine, "work_units"), "work_units");
    }

    #[test]
    fn reserved_words_are_quoted() {
        let engine = MemoryEngine::new();
        assert_eq!(ident(&engine, "order"), "\"order\"");
        assert_eq!(ident(&engine, "user"), "\"user\"");
    }

    #[test]
    fn literals_escape_quotes() {
        assert_eq!(literal(Some("it's")), "'it''s'");
        assert_eq!(literal(None), "NULL");
    }

    #[test]
    fn insert_statement_shape() {
        let engine = MemoryEngine::new();
        let sql = insert(
            &engine,
            "users",
            &[
                ("oid".into(), Some("u1".into())),
                ("name".into(), Some("ada".into())),
                ("email".into(), None),
            ],
        );
        assert_eq!(
            sql,
            "INSERT INTO users (oid, name, email) VALUES ('u1', 'ada', NULL)"
        );
    }

    #[test]
    fn update_statement_shape() {
        let engine = MemoryEngine::new();
        let sql = update(
            &engine,
            "users",
            &[("name".into(), Some("grace".into()))],
            "oid",
            "u1",
        );
        assert_eq!(sql, "UPDATE users SET name = 'grace' WHERE oid = 'u1'");
    }

    #[test]
    fn delete_and_select_shapes() {
        let engine = MemoryEngine::new();
        assert_eq!(
            delete(&engine, "users", "oid", "u1"),
            "DELETE FROM users WHERE oid = 'u1'"
        );
        assert_eq!(select_all(&engine, "users"), "SELECT * FROM users");
        assert_eq!(
            select_where(&engine, "tasks", "project_oid", "p1"),
            "SELECT * FROM tasks WHERE project_oid = 'p1'"
        );
    }
}
