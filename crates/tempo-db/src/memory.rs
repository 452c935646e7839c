//! In-memory storage backends for tests and embedding.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tempo_model::{ObjectKind, ObjectRecord};
use tempo_types::Oid;

use crate::backend::StorageBackend;
use crate::error::DbResult;

/// A `HashMap`-based [`StorageBackend`].
///
/// Transactions are implemented by snapshotting the whole map at `begin`;
/// `rollback` swaps the snapshot back. Data is lost when the backend is
/// dropped.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    records: HashMap<Oid, ObjectRecord>,
    snapshot: Option<HashMap<Oid, ObjectRecord>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Seed the backend with pre-existing records (test setup).
    pub fn with_records(records: Vec<ObjectRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.oid, r)).collect(),
            snapshot: None,
        }
    }
}

impl StorageBackend for InMemoryBackend {
    fn load_all(&mut self) -> DbResult<Vec<ObjectRecord>> {
        let mut all: Vec<ObjectRecord> = self.records.values().cloned().collect();
        all.sort_by_key(|r| r.oid);
        Ok(all)
    }

    fn fetch(&self, oid: Oid) -> DbResult<Option<ObjectRecord>> {
        Ok(self.records.get(&oid).cloned())
    }

    fn insert(&mut self, record: &ObjectRecord) -> DbResult<()> {
        self.records.insert(record.oid, record.clone());
        Ok(())
    }

    fn update(&mut self, record: &ObjectRecord) -> DbResult<()> {
        self.records.insert(record.oid, record.clone());
        Ok(())
    }

    fn delete(&mut self, oid: Oid, _kind: ObjectKind) -> DbResult<()> {
        self.records.remove(&oid);
        Ok(())
    }

    fn begin(&mut self) -> DbResult<()> {
        self.snapshot = Some(self.records.clone());
        Ok(())
    }

    fn commit(&mut self) -> DbResult<()> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> DbResult<()> {
        if let Some(snapshot) = self.snapshot.take() {
            self.records = snapshot;
        }
        Ok(())
    }
}

/// A cloneable handle over a shared [`InMemoryBackend`].
///
/// Lets a test (or an embedder) keep a second handle to the storage a
/// database was opened over, to inspect it afterwards or to reopen and
/// observe what a reload would see.
#[derive(Clone, Debug, Default)]
pub struct SharedBackend {
    inner: Arc<Mutex<InMemoryBackend>>,
}

impl SharedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records currently stored.
    pub fn record_count(&self) -> usize {
        self.inner.lock().expect("backend poisoned").len()
    }

    /// Returns `true` if storage holds a record for `oid`.
    pub fn contains_record(&self, oid: Oid) -> bool {
        self.inner
            .lock()
            .expect("backend poisoned")
            .records
            .contains_key(&oid)
    }
}

impl StorageBackend for SharedBackend {
    fn load_all(&mut self) -> DbResult<Vec<ObjectRecord>> {
        self.inner.lock().expect("backend poisoned").load_all()
    }

    fn fetch(&self, oid: Oid) -> DbResult<Option<ObjectRecord>> {
        self.inner.lock().expect("backend poisoned").fetch(oid)
    }

    fn insert(&mut self, record: &ObjectRecord) -> DbResult<()> {
        self.inner.lock().expect("backend poisoned").insert(record)
    }

    fn update(&mut self, record: &ObjectRecord) -> DbResult<()> {
        self.inner.lock().expect("backend poisoned").update(record)
    }

    fn delete(&mut self, oid: Oid, kind: ObjectKind) -> DbResult<()> {
        self.inner.lock().expect("backend poisoned").delete(oid, kind)
    }

    fn begin(&mut self) -> DbResult<()> {
        self.inner.lock().expect("backend poisoned").begin()
    }

    fn commit(&mut self) -> DbResult<()> {
        self.inner.lock().expect("backend poisoned").commit()
    }

    fn rollback(&mut self) -> DbResult<()> {
        self.inner.lock().expect("backend poisoned").rollback()
    }
}

#[cfg(test)]
mod tests {
    use tempo_model::{Persistent, User};

    use super::*;

    fn record(name: &str) -> ObjectRecord {
        User::new(name, format!("{name}@example.org")).serialize(Oid::random())
    }

    #[test]
    fn insert_fetch_delete() {
        let mut backend = InMemoryBackend::new();
        let rec = record("ada");
        backend.insert(&rec).unwrap();
        assert!(backend.contains(rec.oid).unwrap());
        assert_eq!(backend.fetch(rec.oid).unwrap().unwrap(), rec);

        backend.delete(rec.oid, rec.kind).unwrap();
        assert!(!backend.contains(rec.oid).unwrap());
    }

    #[test]
    fn load_all_is_sorted_by_oid() {
        let mut backend =
            InMemoryBackend::with_records(vec![record("a"), record("b"), record("c")]);
        let all = backend.load_all().unwrap();
        assert_eq!(all.len(), 3);
        for pair in all.windows(2) {
            assert!(pair[0].oid <= pair[1].oid);
        }
    }

    #[test]
    fn rollback_restores_begin_state() {
        let mut backend = InMemoryBackend::new();
        let keep = record("keep");
        backend.insert(&keep).unwrap();

        backend.begin().unwrap();
        backend.insert(&record("discard")).unwrap();
        backend.delete(keep.oid, keep.kind).unwrap();
        backend.rollback().unwrap();

        assert_eq!(backend.len(), 1);
        assert!(backend.contains(keep.oid).unwrap());
    }

    #[test]
    fn commit_keeps_writes() {
        let mut backend = InMemoryBackend::new();
        backend.begin().unwrap();
        let rec = record("ada");
        backend.insert(&rec).unwrap();
        backend.commit().unwrap();
        assert!(backend.contains(rec.oid).unwrap());
    }

    #[test]
    fn shared_handles_see_the_same_records() {
        let shared = SharedBackend::new();
        let mut writer = shared.clone();
        let rec = record("ada");
        writer.insert(&rec).unwrap();

        assert_eq!(shared.record_count(), 1);
        assert!(shared.contains_record(rec.oid));
    }

    #[test]
    fn rollback_without_begin_is_a_no_op() {
        let mut backend = InMemoryBackend::new();
        backend.insert(&record("ada")).unwrap();
        backend.rollback().unwrap();
        assert_eq!(backend.len(), 1);
    }
}
