use tempo_model::{ObjectKind, ObjectRecord};
use tempo_types::Oid;

use crate::error::DbResult;

/// Storage seam between the database core and a concrete persistence
/// strategy (relational rows, a single-file element tree, or the in-memory
/// reference backend).
///
/// All implementations must satisfy these invariants:
/// - `insert`/`update`/`delete` are single-record operations; atomicity
///   across several of them comes from the transaction primitives.
/// - `rollback` restores the state as of the matching `begin`.
/// - Records returned by `load_all`/`fetch` round-trip: feeding them back
///   to `insert` reproduces identical storage content.
/// - I/O failures are propagated, never swallowed.
pub trait StorageBackend: Send {
    /// Read every object record in storage.
    fn load_all(&mut self) -> DbResult<Vec<ObjectRecord>>;

    /// Read one record by identity. `Ok(None)` if absent.
    fn fetch(&self, oid: Oid) -> DbResult<Option<ObjectRecord>>;

    /// Returns `true` if storage holds a record for `oid`.
    fn contains(&self, oid: Oid) -> DbResult<bool> {
        Ok(self.fetch(oid)?.is_some())
    }

    /// Write a new record.
    fn insert(&mut self, record: &ObjectRecord) -> DbResult<()>;

    /// Rewrite an existing record.
    fn update(&mut self, record: &ObjectRecord) -> DbResult<()>;

    /// Remove a record from storage.
    fn delete(&mut self, oid: Oid, kind: ObjectKind) -> DbResult<()>;

    /// Open a storage-level transaction.
    fn begin(&mut self) -> DbResult<()>;

    /// Make all writes since `begin` durable.
    fn commit(&mut self) -> DbResult<()>;

    /// Discard all writes since `begin`.
    fn rollback(&mut self) -> DbResult<()>;
}
