//! Record ↔ row mapping.
//!
//! Encoding turns one [`ObjectRecord`] into its main-table row plus any
//! join-table rows for multi-valued associations. Decoding rebuilds the
//! record from result rows; parent-side child lists come back empty here
//! and are filled in by the backend from the children's backpointer columns
//! ([`add_child`]), in oid order — the relational layout does not persist
//! list positions for aggregations.

use tempo_model::{
    ChildSet, ModelError, MultiRef, ObjectKind, ObjectRecord, PropertyValue, SingleRef,
};
use tempo_types::Oid;

use crate::engine::Row;
use crate::error::{SqlError, SqlResult};
use crate::schema;

/// One row destined for (or read from) a named table.
#[derive(Clone, Debug, PartialEq)]
pub struct TableRow {
    pub table: String,
    pub columns: Vec<(String, Option<String>)>,
}

/// Encode a record as its main row plus join-table rows.
pub fn record_to_rows(record: &ObjectRecord) -> SqlResult<Vec<TableRow>> {
    let kind = record.kind;
    let mut columns = vec![("oid".to_string(), Some(record.oid.to_canonical()))];

    for spec in kind.properties() {
        let value = match record.properties.get(spec.name) {
            None | Some(PropertyValue::Null) => {
                if !spec.required {
                    None
                } else {
                    return Err(ModelError::MissingProperty {
                        kind,
                        name: spec.name.to_string(),
                    }
                    .into());
                }
            }
            Some(value) => value.to_text(),
        };
        columns.push((spec.name.to_string(), value));
    }
    if let Some(parent_col) = schema::parent_column(kind) {
        columns.push((parent_col, record.parent.map(|oid| oid.to_canonical())));
    }
    for (edge, _) in kind.references() {
        columns.push((
            schema::reference_column(edge),
            record.reference(edge).map(|oid| oid.to_canonical()),
        ));
    }

    let mut rows = vec![TableRow {
        table: kind.table_name(),
        columns,
    }];
    for (edge, _) in kind.reference_lists() {
        let (table, owner, target) = schema::join_table(kind, edge);
        for (position, member) in record.reference_list(edge).iter().enumerate() {
            rows.push(TableRow {
                table: table.clone(),
                columns: vec![
                    (owner.clone(), Some(record.oid.to_canonical())),
                    (target.clone(), Some(member.to_canonical())),
                    ("position".to_string(), Some(position.to_string())),
                ],
            });
        }
    }
    Ok(rows)
}

/// Decode a main-table row into a record.
///
/// Every edge the kind declares is materialized (empty where storage holds
/// nothing) so the result matches what the object hooks emit. Child lists
/// and multi-valued targets are filled in afterwards by the backend.
pub fn row_to_record(kind: ObjectKind, row: &Row) -> SqlResult<ObjectRecord> {
    let table = kind.table_name();
    let oid_text = required_text(&table, row, "oid")?;
    let oid = Oid::parse(&oid_text)?;
    let mut record = ObjectRecord::new(oid, kind);

    for spec in kind.properties() {
        let cell = row.get(spec.name).ok_or_else(|| SqlError::MissingColumn {
            table: table.clone(),
            column: spec.name.to_string(),
        })?;
        let value = match cell {
            None if !spec.required => PropertyValue::Null,
            None => {
                return Err(SqlError::UnexpectedNull {
                    table,
                    column: spec.name.to_string(),
                })
            }
            Some(text) => PropertyValue::parse(spec.kind, text)?,
        };
        record.properties.insert(spec.name.to_string(), value);
    }

    if let Some(parent_col) = schema::parent_column(kind) {
        record.parent = optional_oid(&table, row, &parent_col)?;
    }
    for (edge, _) in kind.references() {
        let target = optional_oid(&table, row, &schema::reference_column(edge))?;
        record.references.push(SingleRef {
            edge: edge.to_string(),
            target,
        });
    }
    for (edge, _) in kind.aggregations() {
        record.aggregations.push(ChildSet {
            edge: edge.to_string(),
            children: Vec::new(),
        });
    }
    for (edge, _) in kind.reference_lists() {
        record.reference_lists.push(MultiRef {
            edge: edge.to_string(),
            targets: Vec::new(),
        });
    }
    Ok(record)
}

/// Append `child` to the parent record's child list for its kind.
pub fn add_child(parent: &mut ObjectRecord, child_kind: ObjectKind, child: Oid) -> SqlResult<()> {
    let edge = parent
        .kind
        .aggregations()
        .iter()
        .find(|(_, kind)| *kind == child_kind)
        .map(|(edge, _)| *edge)
        .ok_or_else(|| {
            SqlError::from(ModelError::UnknownEdge {
                kind: parent.kind,
                edge: format!("<child {child_kind}>"),
            })
        })?;
    let set = parent
        .aggregations
        .iter_mut()
        .find(|set| set.edge == edge)
        .expect("declared edges are materialized by row_to_record");
    set.children.push(child);
    Ok(())
}

/// Append a join-table target to the record's multi-valued edge.
pub fn add_member(record: &mut ObjectRecord, edge: &str, target: Oid) -> SqlResult<()> {
    let list = record
        .reference_lists
        .iter_mut()
        .find(|list| list.edge == edge)
        .ok_or_else(|| {
            SqlError::from(ModelError::UnknownEdge {
                kind: record.kind,
                edge: edge.to_string(),
            })
        })?;
    list.targets.push(target);
    Ok(())
}

fn required_text(table: &str, row: &Row, column: &str) -> SqlResult<String> {
    match row.get(column) {
        None => Err(SqlError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }),
        Some(None) => Err(SqlError::UnexpectedNull {
            table: table.to_string(),
            column: column.to_string(),
        }),
        Some(Some(text)) => Ok(text.clone()),
    }
}

fn optional_oid(table: &str, row: &Row, column: &str) -> SqlResult<Option<Oid>> {
    match row.get(column) {
        None => Err(SqlError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        }),
        Some(None) => Ok(None),
        Some(Some(text)) => Ok(Some(Oid::parse(text)?)),
    }
}
