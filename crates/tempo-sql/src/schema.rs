//! Relational layout of the object model.
//!
//! One table per kind, keyed by the canonical `oid` text. Scalar properties
//! map to typed columns, the aggregation backpointer and single-valued
//! associations map to nullable oid columns, and multi-valued associations
//! map to join tables with an explicit position column. Parent-side child
//! lists are implicit — they are reconstructed from the children's
//! backpointer columns at load time.

use tempo_model::{ObjectKind, PropertyKind, ALL_KINDS};

use crate::engine::SqlEngine;
use crate::writer;

/// The aggregation backpointer column of a child kind
/// (e.g. `project_oid` on `tasks`).
pub fn parent_column(kind: ObjectKind) -> Option<String> {
    kind.parent_kind()
        .map(|parent| format!("{}_oid", parent.as_tag()))
}

/// Foreign-key column for a single-valued association edge.
pub fn reference_column(edge: &str) -> String {
    format!("{edge}_oid")
}

/// Join table for a multi-valued association edge of `kind`:
/// `(table, owner column, target column)`.
pub fn join_table(kind: ObjectKind, edge: &str) -> (String, String, String) {
    (
        format!("{}_{edge}", kind.as_tag()),
        format!("{}_oid", kind.as_tag()),
        format!("{edge}_oid"),
    )
}

fn sql_type(kind: PropertyKind) -> &'static str {
    match kind {
        PropertyKind::Text => "TEXT",
        PropertyKind::Integer => "INTEGER",
        PropertyKind::Real => "REAL",
        PropertyKind::Bool => "BOOLEAN",
        // Canonical RFC 3339 text.
        PropertyKind::Timestamp => "TEXT",
    }
}

/// CREATE TABLE statements for the whole schema, parents before children.
pub fn create_statements(engine: &dyn SqlEngine) -> Vec<String> {
    let mut statements = Vec::new();
    for kind in ALL_KINDS {
        let mut columns = vec![format!("{} TEXT PRIMARY KEY", writer::ident(engine, "oid"))];
        for spec in kind.properties() {
            let constraint = if spec.required { " NOT NULL" } else { "" };
            columns.push(format!(
                "{} {}{constraint}",
                writer::ident(engine, spec.name),
                sql_type(spec.kind)
            ));
        }
        if let Some(parent) = parent_column(kind) {
            columns.push(format!("{} TEXT", writer::ident(engine, &parent)));
        }
        for (edge, _) in kind.references() {
            columns.push(format!(
                "{} TEXT",
                writer::ident(engine, &reference_column(edge))
            ));
        }
        statements.push(format!(
            "CREATE TABLE {} ({})",
            writer::ident(engine, &kind.table_name()),
            columns.join(", ")
        ));

        for (edge, _) in kind.reference_lists() {
            let (table, owner, target) = join_table(kind, edge);
            statements.push(format!(
                "CREATE TABLE {} ({} TEXT NOT NULL, {} TEXT NOT NULL, {} INTEGER NOT NULL)",
                writer::ident(engine, &table),
                writer::ident(engine, &owner),
                writer::ident(engine, &target),
                writer::ident(engine, "position")
            ));
        }
    }
    statements
}

#[cfg(test)]
mod tests {
    use crate::engine::MemoryEngine;

    use super::*;

    #[test]
    fn child_kinds_have_backpointer_columns() {
        assert_eq!(parent_column(ObjectKind::Task).as_deref(), Some("project_oid"));
        assert_eq!(
            parent_column(ObjectKind::WorkUnit).as_deref(),
            Some("workload_oid")
        );
        assert_eq!(parent_column(ObjectKind::User), None);
    }

    #[test]
    fn join_table_naming() {
        let (table, owner, target) = join_table(ObjectKind::Project, "members");
        assert_eq!(table, "project_members");
        assert_eq!(owner, "project_oid");
        assert_eq!(target, "members_oid");
    }

    #[test]
    fn schema_covers_every_kind_plus_join_tables() {
        let engine = MemoryEngine::new();
        let statements = create_statements(&engine);
        // 9 kind tables + 1 join table.
        assert_eq!(statements.len(), 10);
        assert!(statements
            .iter()
            .any(|s| s.starts_with("CREATE TABLE project_members ")));
    }

    #[test]
    fn task_table_ddl_shape() {
        let engine = MemoryEngine::new();
        let statements = create_statements(&engine);
        let tasks = statements
            .iter()
            .find(|s| s.starts_with("CREATE TABLE tasks "))
            .unwrap();
        assert!(tasks.contains("oid TEXT PRIMARY KEY"));
        assert!(tasks.contains("due TEXT,"));
        assert!(tasks.contains("done BOOLEAN NOT NULL"));
        assert!(tasks.contains("project_oid TEXT"));
        assert!(tasks.contains("assignee_oid TEXT"));
    }
}
