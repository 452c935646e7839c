//! Whole-graph structural validation.
//!
//! Walks every object reachable from the root collections (plus any
//! resident stragglers) exactly once, cycle-safe, checking:
//!
//! - aggregation consistency: a child's backpointer names an existing
//!   parent of the right kind, and that parent's child list contains it;
//! - association integrity: every edge target exists and has the kind the
//!   edge schema declares;
//! - name uniqueness inside each scope (users and accounts globally,
//!   projects per account, tasks per project);
//! - each object's own invariant hooks.
//!
//! Recycled objects are validated from their storage records; object-hook
//! checks additionally run for resident objects.

use std::collections::{HashMap, HashSet};

use tempo_model::{GraphView, ObjectKind, ObjectRecord, Persistent, ValidationIssue};
use tempo_types::Oid;

use crate::database::DbInner;
use crate::error::DbResult;

/// Outcome of a validation pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Objects examined.
    pub visited: usize,
    /// Every violation found, in walk order.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Graph view over the arena with storage fallback for recycled objects.
struct InnerView<'a> {
    inner: &'a DbInner,
}

impl InnerView<'_> {
    fn record_of(&self, oid: Oid) -> Option<ObjectRecord> {
        if let Some(slot) = self.inner.slots.get(&oid) {
            // Serialization mutates cache state; work on a copy.
            let mut object = slot.object.clone();
            return Some(object.serialize(oid));
        }
        self.inner.backend.fetch(oid).ok().flatten()
    }
}

impl GraphView for InnerView<'_> {
    fn kind_of(&self, oid: Oid) -> Option<ObjectKind> {
        if let Some(slot) = self.inner.slots.get(&oid) {
            return Some(slot.object.kind());
        }
        self.inner
            .backend
            .fetch(oid)
            .ok()
            .flatten()
            .map(|record| record.kind)
    }

    fn is_live(&self, oid: Oid) -> bool {
        self.inner.slots.contains_key(&oid)
            || self.inner.backend.contains(oid).unwrap_or(false)
    }

    fn parent_of(&self, oid: Oid) -> Option<Oid> {
        self.record_of(oid).and_then(|record| record.parent)
    }

    fn has_child(&self, parent: Oid, edge: &str, child: Oid) -> bool {
        self.record_of(parent)
            .map(|record| record.children(edge).contains(&child))
            .unwrap_or(false)
    }
}

/// Validate the whole graph held by `inner`.
pub(crate) fn validate_graph(inner: &DbInner) -> DbResult<ValidationReport> {
    let view = InnerView { inner };
    let mut visited = HashSet::new();
    let mut report = ValidationReport::default();

    for collection in inner.roots.values() {
        for &oid in collection {
            visit(inner, &view, oid, &mut visited, &mut report.issues)?;
        }
    }
    // Resident objects a corrupt graph fails to reach from any root
    // (orphans) still get checked.
    let mut stragglers: Vec<Oid> = inner
        .slots
        .keys()
        .copied()
        .filter(|oid| !visited.contains(oid))
        .collect();
    stragglers.sort();
    for oid in stragglers {
        visit(inner, &view, oid, &mut visited, &mut report.issues)?;
    }

    check_name_scopes(inner, &view, &visited, &mut report.issues);
    report.visited = visited.len();
    Ok(report)
}

fn visit(
    inner: &DbInner,
    view: &InnerView<'_>,
    oid: Oid,
    visited: &mut HashSet<Oid>,
    issues: &mut Vec<ValidationIssue>,
) -> DbResult<()> {
    if !visited.insert(oid) {
        return Ok(());
    }
    let Some(record) = view.record_of(oid) else {
        // Reported by whichever edge led here.
        return Ok(());
    };
    let kind = record.kind;

    check_parent_edge(view, &record, issues);
    check_aggregations(view, &record, issues);
    check_associations(view, &record, issues);

    if let Some(slot) = inner.slots.get(&oid) {
        slot.object.validate(oid, view, issues);
    }

    for set in &record.aggregations {
        for &child in &set.children {
            if !view.is_live(child) {
                issues.push(ValidationIssue::new(
                    oid,
                    kind,
                    format!("child list '{}' names missing object {child}", set.edge),
                ));
                continue;
            }
            visit(inner, view, child, visited, issues)?;
        }
    }
    for single in &record.references {
        if let Some(target) = single.target {
            if view.is_live(target) {
                visit(inner, view, target, visited, issues)?;
            }
        }
    }
    for multi in &record.reference_lists {
        for &target in &multi.targets {
            if view.is_live(target) {
                visit(inner, view, target, visited, issues)?;
            }
        }
    }
    Ok(())
}

/// The child side of an aggregation: backpointer present, parent existing,
/// parent of the declared kind, and the parent's list naming this child.
fn check_parent_edge(view: &InnerView<'_>, record: &ObjectRecord, issues: &mut Vec<ValidationIssue>) {
    let kind = record.kind;
    match (kind.parent_kind(), record.parent) {
        (None, None) => {}
        (None, Some(parent)) => {
            issues.push(ValidationIssue::new(
                record.oid,
                kind,
                format!("root-collection object carries a parent backpointer to {parent}"),
            ));
        }
        (Some(_), None) => {
            issues.push(ValidationIssue::new(
                record.oid,
                kind,
                "aggregated object has no parent backpointer",
            ));
        }
        (Some(expected), Some(parent)) => match view.kind_of(parent) {
            None => {
                issues.push(ValidationIssue::new(
                    record.oid,
                    kind,
                    format!("parent {parent} does not exist"),
                ));
            }
            Some(actual) if actual != expected => {
                issues.push(ValidationIssue::new(
                    record.oid,
                    kind,
                    format!("parent {parent} is a {actual}, expected {expected}"),
                ));
            }
            Some(parent_kind) => {
                let edge = parent_kind
                    .aggregations()
                    .iter()
                    .find(|(_, child)| *child == kind)
                    .map(|(edge, _)| *edge);
                let indexed = edge
                    .map(|edge| view.has_child(parent, edge, record.oid))
                    .unwrap_or(false);
                if !indexed {
                    issues.push(ValidationIssue::new(
                        record.oid,
                        kind,
                        format!("parent {parent} does not list this object as a child"),
                    ));
                }
            }
        },
    }
}

/// The parent side of an aggregation: declared edges only, children of the
/// declared kind pointing back here.
fn check_aggregations(
    view: &InnerView<'_>,
    record: &ObjectRecord,
    issues: &mut Vec<ValidationIssue>,
) {
    let kind = record.kind;
    for set in &record.aggregations {
        let Some((_, child_kind)) = kind
            .aggregations()
            .iter()
            .find(|(edge, _)| *edge == set.edge)
        else {
            issues.push(ValidationIssue::new(
                record.oid,
                kind,
                format!("undeclared aggregation edge '{}'", set.edge),
            ));
            continue;
        };
        for &child in &set.children {
            match view.kind_of(child) {
                None => {
                    // Missing children are reported in the walk.
                }
                Some(actual) if actual != *child_kind => {
                    issues.push(ValidationIssue::new(
                        record.oid,
                        kind,
                        format!(
                            "child {child} under '{}' is a {actual}, expected {child_kind}",
                            set.edge
                        ),
                    ));
                }
                Some(_) => {
                    if view.parent_of(child) != Some(record.oid) {
                        issues.push(ValidationIssue::new(
                            record.oid,
                            kind,
                            format!("child {child} does not point back to this parent"),
                        ));
                    }
                }
            }
        }
    }
}

/// Association edges: declared names only, existing targets of the declared
/// kind.
fn check_associations(
    view: &InnerView<'_>,
    record: &ObjectRecord,
    issues: &mut Vec<ValidationIssue>,
) {
    let kind = record.kind;
    for single in &record.references {
        let Some((_, target_kind)) = kind
            .references()
            .iter()
            .find(|(edge, _)| *edge == single.edge)
        else {
            issues.push(ValidationIssue::new(
                record.oid,
                kind,
                format!("undeclared association edge '{}'", single.edge),
            ));
            continue;
        };
        if let Some(target) = single.target {
            check_target(view, record, &single.edge, target, *target_kind, issues);
        }
    }
    for multi in &record.reference_lists {
        let Some((_, target_kind)) = kind
            .reference_lists()
            .iter()
            .find(|(edge, _)| *edge == multi.edge)
        else {
            issues.push(ValidationIssue::new(
                record.oid,
                kind,
                format!("undeclared association edge '{}'", multi.edge),
            ));
            continue;
        };
        for &target in &multi.targets {
            check_target(view, record, &multi.edge, target, *target_kind, issues);
        }
    }
}

fn check_target(
    view: &InnerView<'_>,
    record: &ObjectRecord,
    edge: &str,
    target: Oid,
    expected: ObjectKind,
    issues: &mut Vec<ValidationIssue>,
) {
    match view.kind_of(target) {
        None => {
            issues.push(ValidationIssue::new(
                record.oid,
                record.kind,
                format!("association '{edge}' targets missing object {target}"),
            ));
        }
        Some(actual) if actual != expected => {
            issues.push(ValidationIssue::new(
                record.oid,
                record.kind,
                format!("association '{edge}' target {target} has kind {actual}, expected {expected}"),
            ));
        }
        Some(_) => {}
    }
}

/// Name-uniqueness scopes: users and accounts database-wide, projects per
/// owning account, tasks per owning project.
fn check_name_scopes(
    inner: &DbInner,
    view: &InnerView<'_>,
    visited: &HashSet<Oid>,
    issues: &mut Vec<ValidationIssue>,
) {
    // scope key -> name -> first holder
    let mut seen: HashMap<(ObjectKind, Option<Oid>, String), Oid> = HashMap::new();
    let mut oids: Vec<Oid> = visited.iter().copied().collect();
    oids.sort();
    for oid in oids {
        let Some(record) = view.record_of(oid) else {
            continue;
        };
        let name = match record.kind {
            ObjectKind::User | ObjectKind::Account | ObjectKind::Project | ObjectKind::Task => {
                match inner.slots.get(&oid).and_then(|s| s.object.scoped_name()) {
                    Some(name) => name.to_string(),
                    None => match record.require_text("name") {
                        Ok(name) => name,
                        Err(_) => continue,
                    },
                }
            }
            _ => continue,
        };
        let scope = match record.kind {
            ObjectKind::Project | ObjectKind::Task => record.parent,
            _ => None,
        };
        let key = (record.kind, scope, name.clone());
        match seen.get(&key) {
            None => {
                seen.insert(key, oid);
            }
            Some(&first) => {
                issues.push(ValidationIssue::new(
                    oid,
                    record.kind,
                    format!(
                        "duplicate {} name '{name}' (also held by {first})",
                        record.kind
                    ),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::{TimeZone, Utc};
    use tempo_model::{Account, Activity, Project, Task, User, WorkUnit, Workload};
    use tempo_types::{Oid, Principal};

    use crate::address::AddressRegistry;
    use crate::config::DatabaseConfig;
    use crate::database::Database;
    use crate::memory::SharedBackend;

    fn open_empty() -> Database {
        let registry = AddressRegistry::new();
        let address = registry.address_of(Path::new("/data/val.tempo")).unwrap();
        Database::open(
            address,
            Box::new(SharedBackend::new()),
            DatabaseConfig::default(),
        )
        .unwrap()
    }

    fn anyone() -> Principal {
        Principal::anonymous()
    }

    #[test]
    fn a_well_formed_graph_passes() {
        let db = open_empty();
        let user = db.create(User::new("ada", "ada@example.org")).unwrap();

        let mut account = Account::new("acme");
        account.owner = Some(user);
        let account_oid = db.create(account).unwrap();

        let mut project = Project::new("site");
        project.account = Some(account_oid);
        project.members = vec![user];
        let project_oid = db.create(project).unwrap();

        let mut task = Task::new("deploy");
        task.project = Some(project_oid);
        task.assignee = Some(user);
        db.create(task).unwrap();

        let start = Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 3, 17, 0, 0).unwrap();
        let mut workload = Workload::new(start, end);
        workload.user = Some(user);
        let workload_oid = db.create(workload).unwrap();

        let mut unit = WorkUnit::new(start, end);
        unit.workload = Some(workload_oid);
        db.create(unit).unwrap();

        let report = db.validate().unwrap();
        assert!(report.is_valid(), "unexpected issues: {:?}", report.issues);
        assert_eq!(report.visited, 6);
    }

    #[test]
    fn duplicate_user_names_are_flagged() {
        let db = open_empty();
        db.create(User::new("ada", "ada@example.org")).unwrap();
        db.create(User::new("ada", "other@example.org")).unwrap();

        let report = db.validate().unwrap();
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].reason.contains("duplicate user name 'ada'"));
    }

    #[test]
    fn same_project_name_in_different_accounts_is_fine() {
        let db = open_empty();
        for account_name in ["acme", "globex"] {
            let account = db.create(Account::new(account_name)).unwrap();
            let mut project = Project::new("site");
            project.account = Some(account);
            db.create(project).unwrap();
        }
        assert!(db.validate().unwrap().is_valid());
    }

    #[test]
    fn duplicate_task_names_in_one_project_are_flagged() {
        let db = open_empty();
        let account = db.create(Account::new("acme")).unwrap();
        let mut project = Project::new("site");
        project.account = Some(account);
        let project_oid = db.create(project).unwrap();

        for _ in 0..2 {
            let mut task = Task::new("deploy");
            task.project = Some(project_oid);
            db.create(task).unwrap();
        }

        let report = db.validate().unwrap();
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0].reason.contains("duplicate task name"));
    }

    #[test]
    fn dangling_associations_are_flagged() {
        let db = open_empty();
        let account = db.create(Account::new("acme")).unwrap();
        let ghost = Oid::random();
        db.update(account, &anyone(), |object| {
            if let tempo_model::DomainObject::Account(acct) = object {
                acct.owner = Some(ghost);
            }
        })
        .unwrap();

        let report = db.validate().unwrap();
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0]
            .reason
            .contains(&format!("targets missing object {ghost}")));
    }

    #[test]
    fn wrong_kind_association_targets_are_flagged() {
        let db = open_empty();
        let account = db.create(Account::new("acme")).unwrap();
        let other = db.create(Account::new("globex")).unwrap();
        // An account owned by an account instead of a user.
        db.update(account, &anyone(), |object| {
            if let tempo_model::DomainObject::Account(acct) = object {
                acct.owner = Some(other);
            }
        })
        .unwrap();

        let report = db.validate().unwrap();
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0]
            .reason
            .contains("has kind account, expected user"));
    }

    #[test]
    fn association_cycles_terminate_and_visit_each_object_once() {
        let db = open_empty();
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 3, 17, 0, 0).unwrap();

        // work unit -> activity -> workload -> aggregated work unit: a cycle
        // through association edges.
        let workload_oid = db.create(Workload::new(start, end)).unwrap();
        let mut activity = Activity::new("billing");
        activity.core.workload = Some(workload_oid);
        let activity_oid = db.create(activity).unwrap();
        let mut unit = WorkUnit::new(start, end);
        unit.workload = Some(workload_oid);
        unit.activity = Some(activity_oid);
        db.create(unit).unwrap();

        let report = db.validate().unwrap();
        assert!(report.is_valid(), "unexpected issues: {:?}", report.issues);
        assert_eq!(report.visited, 3);
    }

    #[test]
    fn a_child_the_parent_does_not_list_is_flagged() {
        let db = open_empty();
        let account = db.create(Account::new("acme")).unwrap();
        let mut project = Project::new("site");
        project.account = Some(account);
        let project_oid = db.create(project).unwrap();
        let mut task = Task::new("deploy");
        task.project = Some(project_oid);
        db.create(task).unwrap();

        db.update(project_oid, &anyone(), |object| {
            if let tempo_model::DomainObject::Project(proj) = object {
                proj.tasks.clear();
            }
        })
        .unwrap();

        let report = db.validate().unwrap();
        assert_eq!(report.issues.len(), 1);
        assert!(report.issues[0]
            .reason
            .contains("does not list this object as a child"));
    }

    #[test]
    fn recycled_objects_are_still_validated() {
        let db = open_empty();
        let account = db.create(Account::new("acme")).unwrap();
        let mut project = Project::new("site");
        project.account = Some(account);
        db.create(project).unwrap();

        // Make everything Old and recycle it; validation falls back to the
        // storage records.
        for oid in [account] {
            db.add_reference(oid).unwrap();
            db.remove_reference(oid).unwrap();
        }
        db.recycle().unwrap();

        let report = db.validate().unwrap();
        assert!(report.is_valid(), "unexpected issues: {:?}", report.issues);
        assert_eq!(report.visited, 2);
    }
}
