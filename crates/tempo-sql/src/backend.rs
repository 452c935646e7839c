//! Relational [`StorageBackend`] over an opaque [`SqlEngine`].
//!
//! Aggregation child lists are not stored on the parent; [`load_all`] and
//! [`fetch`] rebuild them from the children's backpointer columns, in oid
//! order. A graph written and reloaded through this backend is therefore
//! equal up to that normalization of child-list order. Multi-valued
//! association targets keep their positions via the join tables.
//!
//! [`load_all`]: StorageBackend::load_all
//! [`fetch`]: StorageBackend::fetch

use std::collections::HashMap;

use tempo_db::{DbError, DbResult, StorageBackend};
use tempo_model::{ObjectKind, ObjectRecord, ALL_KINDS};
use tempo_types::{Oid, TypeError};
use tracing::debug;

use crate::engine::{Row, SqlEngine};
use crate::error::SqlResult;
use crate::serializer::{self, TableRow};
use crate::{schema, writer};

pub struct SqlBackend<E: SqlEngine> {
    engine: E,
}

impl<E: SqlEngine> SqlBackend<E> {
    /// Wrap `engine` without touching its content. Call
    /// [`initialize`](SqlBackend::initialize) once on empty storage.
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Create the full schema on an empty engine.
    pub fn initialize(&mut self) -> DbResult<()> {
        let statements = schema::create_statements(&self.engine);
        let count = statements.len();
        for statement in statements {
            self.engine
                .execute_update(&statement)
                .map_err(DbError::from)?;
        }
        debug!(tables = count, "relational schema created");
        Ok(())
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn write_rows(&mut self, rows: &[TableRow]) -> SqlResult<()> {
        for row in rows {
            self.engine
                .execute_insert(&writer::insert(&self.engine, &row.table, &row.columns))?;
        }
        Ok(())
    }

    /// Drop every join-table row owned by `oid`.
    fn clear_join_rows(&mut self, oid: Oid, kind: ObjectKind) -> SqlResult<()> {
        for (edge, _) in kind.reference_lists() {
            let (table, owner, _) = schema::join_table(kind, edge);
            self.engine
                .execute_delete(&writer::delete(&self.engine, &table, &owner, &oid.to_canonical()))?;
        }
        Ok(())
    }

    /// Decode every row of the kind's table.
    fn decode_table(&self, kind: ObjectKind) -> SqlResult<Vec<ObjectRecord>> {
        let result = self
            .engine
            .execute_select(&writer::select_all(&self.engine, &kind.table_name()))?;
        result
            .rows
            .iter()
            .map(|row| serializer::row_to_record(kind, row))
            .collect()
    }

    /// Join-table targets owned by `oid` on `edge`, in position order.
    fn members_of(&self, oid: Oid, kind: ObjectKind, edge: &str) -> SqlResult<Vec<Oid>> {
        let (table, owner, target) = schema::join_table(kind, edge);
        let result = self.engine.execute_select(&writer::select_where(
            &self.engine,
            &table,
            &owner,
            &oid.to_canonical(),
        ))?;
        let mut members = Vec::with_capacity(result.len());
        for row in &result.rows {
            members.push((join_position(row)?, join_oid(row, &target)?));
        }
        members.sort_by_key(|(position, _)| *position);
        Ok(members.into_iter().map(|(_, oid)| oid).collect())
    }

    fn attach_members(&self, record: &mut ObjectRecord) -> SqlResult<()> {
        for (edge, _) in record.kind.reference_lists() {
            for member in self.members_of(record.oid, record.kind, edge)? {
                serializer::add_member(record, edge, member)?;
            }
        }
        Ok(())
    }
}

fn join_position(row: &Row) -> SqlResult<i64> {
    let text = row.text("position").unwrap_or_default();
    text.parse::<i64>()
        .map_err(|_| TypeError::parse(text, 0, "expected join-row position").into())
}

fn join_oid(row: &Row, column: &str) -> SqlResult<Oid> {
    let text = row.text(column).unwrap_or_default();
    Ok(Oid::parse(text)?)
}

impl<E: SqlEngine> StorageBackend for SqlBackend<E> {
    fn load_all(&mut self) -> DbResult<Vec<ObjectRecord>> {
        let mut records = Vec::new();
        for kind in ALL_KINDS {
            records.extend(self.decode_table(kind).map_err(DbError::from)?);
        }
        records.sort_by_key(|record| record.oid);

        // Parent-side child lists come from the children's backpointers;
        // oid-sorted iteration fixes the list order.
        let index: HashMap<Oid, usize> = records
            .iter()
            .enumerate()
            .map(|(i, record)| (record.oid, i))
            .collect();
        let edges: Vec<(Oid, ObjectKind, Oid)> = records
            .iter()
            .filter_map(|record| {
                record
                    .parent
                    .map(|parent| (parent, record.kind, record.oid))
            })
            .collect();
        for (parent, child_kind, child) in edges {
            // Orphans stay in the result; graph validation reports them.
            if let Some(&slot) = index.get(&parent) {
                serializer::add_child(&mut records[slot], child_kind, child)
                    .map_err(DbError::from)?;
            }
        }

        for record in &mut records {
            self.attach_members(record).map_err(DbError::from)?;
        }
        Ok(records)
    }

    fn fetch(&self, oid: Oid) -> DbResult<Option<ObjectRecord>> {
        let key = oid.to_canonical();
        for kind in ALL_KINDS {
            let result = self
                .engine
                .execute_select(&writer::select_where(
                    &self.engine,
                    &kind.table_name(),
                    "oid",
                    &key,
                ))
                .map_err(DbError::from)?;
            let Some(row) = result.rows.first() else {
                continue;
            };
            let mut record = serializer::row_to_record(kind, row).map_err(DbError::from)?;

            for (_, child_kind) in kind.aggregations() {
                let parent_col =
                    schema::parent_column(*child_kind).expect("aggregated kinds have backpointers");
                let children = self
                    .engine
                    .execute_select(&writer::select_where(
                        &self.engine,
                        &child_kind.table_name(),
                        &parent_col,
                        &key,
                    ))
                    .map_err(DbError::from)?;
                let mut oids = Vec::with_capacity(children.len());
                for child_row in &children.rows {
                    oids.push(join_oid(child_row, "oid").map_err(DbError::from)?);
                }
                oids.sort();
                for child in oids {
                    serializer::add_child(&mut record, *child_kind, child)
                        .map_err(DbError::from)?;
                }
            }
            self.attach_members(&mut record).map_err(DbError::from)?;
            return Ok(Some(record));
        }
        Ok(None)
    }

    fn insert(&mut self, record: &ObjectRecord) -> DbResult<()> {
        let rows = serializer::record_to_rows(record).map_err(DbError::from)?;
        self.write_rows(&rows).map_err(DbError::from)?;
        Ok(())
    }

    fn update(&mut self, record: &ObjectRecord) -> DbResult<()> {
        let rows = serializer::record_to_rows(record).map_err(DbError::from)?;
        let main = &rows[0];
        let assignments: Vec<(String, Option<String>)> = main
            .columns
            .iter()
            .filter(|(name, _)| name != "oid")
            .cloned()
            .collect();
        if !assignments.is_empty() {
            self.engine
                .execute_update(&writer::update(
                    &self.engine,
                    &main.table,
                    &assignments,
                    "oid",
                    &record.oid.to_canonical(),
                ))
                .map_err(DbError::from)?;
        }
        // Join rows are rewritten wholesale; positions may have shifted.
        self.clear_join_rows(record.oid, record.kind)
            .map_err(DbError::from)?;
        self.write_rows(&rows[1..]).map_err(DbError::from)?;
        Ok(())
    }

    fn delete(&mut self, oid: Oid, kind: ObjectKind) -> DbResult<()> {
        self.engine
            .execute_delete(&writer::delete(
                &self.engine,
                &kind.table_name(),
                "oid",
                &oid.to_canonical(),
            ))
            .map_err(DbError::from)?;
        self.clear_join_rows(oid, kind).map_err(DbError::from)?;
        Ok(())
    }

    fn begin(&mut self) -> DbResult<()> {
        self.engine.begin().map_err(DbError::from)
    }

    fn commit(&mut self) -> DbResult<()> {
        self.engine.commit().map_err(DbError::from)
    }

    fn rollback(&mut self) -> DbResult<()> {
        self.engine.rollback().map_err(DbError::from)
    }
}

#[cfg(test)]
mod tests {
    use tempo_db::{AddressRegistry, Database, DatabaseConfig};
    use tempo_model::{Account, DomainObject, Persistent, Project, Task, User};
    use tempo_types::Principal;

    use crate::engine::MemoryEngine;

    use super::*;

    fn backend() -> SqlBackend<MemoryEngine> {
        let mut backend = SqlBackend::new(MemoryEngine::new());
        backend.initialize().unwrap();
        backend
    }

    #[test]
    fn initialize_creates_one_table_per_kind_plus_joins() {
        let backend = backend();
        let tables = backend.engine().table_names();
        assert_eq!(tables.len(), 10);
        assert!(tables.contains(&"work_units".to_string()));
        assert!(tables.contains(&"project_members".to_string()));
    }

    #[test]
    fn insert_then_fetch_roundtrips_a_record() {
        let mut backend = backend();
        let record = User::new("ada", "ada@example.org").serialize(Oid::random());
        backend.insert(&record).unwrap();

        assert!(backend.contains(record.oid).unwrap());
        assert_eq!(backend.fetch(record.oid).unwrap(), Some(record));
    }

    #[test]
    fn fetch_of_an_absent_oid_is_none() {
        let backend = backend();
        assert_eq!(backend.fetch(Oid::random()).unwrap(), None);
    }

    #[test]
    fn fetch_rebuilds_child_lists_in_oid_order() {
        let mut backend = backend();
        let account_oid = Oid::random();
        let mut project_oids = vec![Oid::random(), Oid::random(), Oid::random()];

        for &oid in &project_oids {
            let mut project = Project::new("p");
            project.account = Some(account_oid);
            backend.insert(&project.serialize(oid)).unwrap();
        }
        let mut account = Account::new("acme");
        account.projects = project_oids.clone();
        backend.insert(&account.serialize(account_oid)).unwrap();

        project_oids.sort();
        let fetched = backend.fetch(account_oid).unwrap().unwrap();
        assert_eq!(fetched.children("projects"), project_oids);
    }

    #[test]
    fn members_keep_their_positions() {
        let mut backend = backend();
        let members = vec![Oid::random(), Oid::random(), Oid::random()];
        let mut project = Project::new("site");
        project.members = members.clone();
        let oid = Oid::random();
        backend.insert(&project.serialize(oid)).unwrap();

        let fetched = backend.fetch(oid).unwrap().unwrap();
        assert_eq!(fetched.reference_list("members"), members);

        // Update reorders the list; storage follows.
        project.members = vec![members[2], members[0]];
        backend.update(&project.serialize(oid)).unwrap();
        let fetched = backend.fetch(oid).unwrap().unwrap();
        assert_eq!(fetched.reference_list("members"), vec![members[2], members[0]]);
    }

    #[test]
    fn update_rewrites_scalar_columns() {
        let mut backend = backend();
        let oid = Oid::random();
        let mut task = Task::new("draft");
        backend.insert(&task.serialize(oid)).unwrap();

        task.core.name = "ship".to_string();
        task.done = true;
        backend.update(&task.serialize(oid)).unwrap();

        let fetched = backend.fetch(oid).unwrap().unwrap();
        assert_eq!(fetched.require_text("name").unwrap(), "ship");
        assert!(fetched.require_bool("done").unwrap());
    }

    #[test]
    fn delete_removes_the_row_and_its_join_rows() {
        let mut backend = backend();
        let oid = Oid::random();
        let mut project = Project::new("site");
        project.members = vec![Oid::random()];
        backend.insert(&project.serialize(oid)).unwrap();

        backend.delete(oid, ObjectKind::Project).unwrap();
        assert!(!backend.contains(oid).unwrap());
        assert_eq!(backend.engine().row_count("project_members"), 0);
    }

    #[test]
    fn rollback_undoes_writes_since_begin() {
        let mut backend = backend();
        let keep = User::new("ada", "ada@example.org").serialize(Oid::random());
        backend.insert(&keep).unwrap();

        backend.begin().unwrap();
        backend
            .insert(&User::new("grace", "grace@example.org").serialize(Oid::random()))
            .unwrap();
        backend.rollback().unwrap();

        assert_eq!(backend.engine().row_count("users"), 1);
        assert!(backend.contains(keep.oid).unwrap());
    }

    #[test]
    fn a_database_runs_end_to_end_on_relational_storage() {
        let registry = AddressRegistry::new();
        let address = registry
            .address_of(std::path::Path::new("/data/tracker.sqlite"))
            .unwrap();
        let db = Database::open(
            address,
            Box::new(backend()),
            DatabaseConfig::default(),
        )
        .unwrap();

        let user = db.create(User::new("ada", "ada@example.org")).unwrap();
        let account = db.create(Account::new("acme")).unwrap();

        let mut project = Project::new("site");
        project.account = Some(account);
        let project = db.create(project).unwrap();

        let mut task = Task::new("ship");
        task.project = Some(project);
        let task = db.create(task).unwrap();

        db.update(project, &Principal::admin(), |object| {
            if let DomainObject::Project(p) = object {
                p.members.push(user);
            }
        })
        .unwrap();

        match db.read(task, &Principal::anonymous()).unwrap() {
            DomainObject::Task(t) => assert_eq!(t.core.name, "ship"),
            other => panic!("unexpected object: {other:?}"),
        }
        match db.read(account, &Principal::anonymous()).unwrap() {
            DomainObject::Account(a) => assert_eq!(a.projects, vec![project]),
            other => panic!("unexpected object: {other:?}"),
        }
        db.check_consistency().unwrap();
        db.close();
    }
}
