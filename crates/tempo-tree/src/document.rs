//! Whole-database document assembly.
//!
//! The persisted layout is one root element per database: every root-
//! collection object is a child of the root, aggregated children are nested
//! under their parents, in the parents' child-list order. Disassembly is the
//! two-pass decode — structure first, association resolution once every
//! element has been seen.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tempo_model::ObjectRecord;
use tempo_types::Oid;

use crate::element::Element;
use crate::error::{TreeError, TreeResult};
use crate::serializer;

/// Name of the document root element.
pub const ROOT_TAG: &str = "tempo-database";

/// One whole database as an element tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub root: Element,
}

impl Document {
    /// An empty database document.
    pub fn empty() -> Self {
        Self {
            root: Element::new(ROOT_TAG),
        }
    }

    /// Number of object elements in the document.
    pub fn object_count(&self) -> usize {
        self.root.subtree_size() - 1
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}

/// Build the document for a full set of records.
///
/// Records with no aggregation parent become children of the root; child
/// lists drive the nesting, so a parent listing a child that is not among
/// `records` is an error.
pub fn assemble(records: &[ObjectRecord]) -> TreeResult<Document> {
    let by_oid: HashMap<Oid, &ObjectRecord> =
        records.iter().map(|record| (record.oid, record)).collect();

    let mut document = Document::empty();
    for record in records.iter().filter(|record| record.parent.is_none()) {
        let element = assemble_subtree(record, &by_oid)?;
        document.root.add_child(element);
    }
    Ok(document)
}

fn assemble_subtree(
    record: &ObjectRecord,
    by_oid: &HashMap<Oid, &ObjectRecord>,
) -> TreeResult<Element> {
    let mut element = serializer::record_to_element(record)?;
    for (edge, _) in record.kind.aggregations() {
        for child_oid in record.children(edge) {
            let child = by_oid.get(&child_oid).ok_or(TreeError::MissingChild {
                parent: record.oid,
                child: child_oid,
            })?;
            element.add_child(assemble_subtree(child, by_oid)?);
        }
    }
    Ok(element)
}

/// Decode the whole document back into records, in document order (parents
/// before their nested children).
pub fn disassemble(document: &Document) -> TreeResult<Vec<ObjectRecord>> {
    let mut records = Vec::with_capacity(document.object_count());
    let mut elements = Vec::with_capacity(document.object_count());
    for element in &document.root.children {
        collect_subtree(element, None, &mut records, &mut elements)?;
    }
    // Second pass: every element is known, associations can resolve.
    for (record, element) in records.iter_mut().zip(&elements) {
        serializer::resolve_associations(record, element)?;
    }
    Ok(records)
}

fn collect_subtree<'a>(
    element: &'a Element,
    parent: Option<Oid>,
    records: &mut Vec<ObjectRecord>,
    elements: &mut Vec<&'a Element>,
) -> TreeResult<()> {
    let record = serializer::element_to_record(element, parent)?;
    let oid = record.oid;
    records.push(record);
    elements.push(element);
    for child in &element.children {
        collect_subtree(child, Some(oid), records, elements)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempo_model::{Account, Persistent, Project, Task, User, Workload};

    use super::*;

    fn sample_records() -> Vec<ObjectRecord> {
        let user_oid = Oid::random();
        let account_oid = Oid::random();
        let project_oid = Oid::random();
        let task_oid = Oid::random();

        let mut account = Account::new("acme");
        account.owner = Some(user_oid);
        account.projects = vec![project_oid];

        let mut project = Project::new("site");
        project.account = Some(account_oid);
        project.members = vec![user_oid];
        project.tasks = vec![task_oid];

        let mut task = Task::new("ship");
        task.project = Some(project_oid);
        task.assignee = Some(user_oid);

        vec![
            User::new("ada", "ada@example.org").serialize(user_oid),
            account.serialize(account_oid),
            project.serialize(project_oid),
            task.serialize(task_oid),
        ]
    }

    #[test]
    fn nesting_follows_the_aggregation_edges() {
        let records = sample_records();
        let document = assemble(&records).unwrap();

        // user and account at the root; project and task nested.
        assert_eq!(document.root.children.len(), 2);
        assert_eq!(document.object_count(), 4);
        let account = &document.root.children[1];
        assert_eq!(account.name, "account");
        assert_eq!(account.children[0].name, "project");
        assert_eq!(account.children[0].children[0].name, "task");
    }

    #[test]
    fn assemble_then_disassemble_is_identity() {
        let records = sample_records();
        let document = assemble(&records).unwrap();
        let decoded = disassemble(&document).unwrap();

        // Document order is parents-first; compare as oid-sorted sets.
        let mut original = records;
        let mut decoded = decoded;
        original.sort_by_key(|record| record.oid);
        decoded.sort_by_key(|record| record.oid);
        assert_eq!(decoded, original);
    }

    #[test]
    fn child_list_order_survives_the_roundtrip() {
        let account_oid = Oid::random();
        let project_oids = vec![Oid::random(), Oid::random(), Oid::random()];

        let mut account = Account::new("acme");
        account.projects = project_oids.clone();
        let mut records = vec![account.serialize(account_oid)];
        for &oid in &project_oids {
            let mut project = Project::new("p");
            project.account = Some(account_oid);
            records.push(project.serialize(oid));
        }

        let decoded = disassemble(&assemble(&records).unwrap()).unwrap();
        let account = decoded
            .iter()
            .find(|record| record.oid == account_oid)
            .unwrap();
        assert_eq!(account.children("projects"), project_oids);
    }

    #[test]
    fn a_parent_listing_a_missing_child_is_rejected() {
        let ghost = Oid::random();
        let mut account = Account::new("acme");
        account.projects = vec![ghost];
        let records = vec![account.serialize(Oid::random())];

        assert!(matches!(
            assemble(&records).unwrap_err(),
            TreeError::MissingChild { child, .. } if child == ghost
        ));
    }

    #[test]
    fn cyclic_associations_decode_cleanly() {
        // workload → user and user ← workload member edges cannot cycle, but
        // an activity referencing its own workload's aggregation parent does
        // traverse back up the tree. The two-pass decode never follows
        // association edges, so any cycle through them is harmless.
        let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 6, 7, 17, 0, 0).unwrap();
        let user_oid = Oid::random();
        let workload_oid = Oid::random();

        let mut workload = Workload::new(t0, t1);
        workload.user = Some(user_oid);
        let records = vec![
            User::new("ada", "ada@example.org").serialize(user_oid),
            workload.serialize(workload_oid),
        ];

        let decoded = disassemble(&assemble(&records).unwrap()).unwrap();
        let decoded_workload = decoded
            .iter()
            .find(|record| record.oid == workload_oid)
            .unwrap();
        assert_eq!(decoded_workload.reference("user"), Some(user_oid));
    }
}
