//! The database core: slot arena, lifecycle bookkeeping, and the public
//! object CRUD surface.
//!
//! # Design Rules
//!
//! - One `Mutex` guards the whole in-memory graph; operations are short
//!   critical sections and never call back into user code while holding it
//!   (the `update` mutator runs under the guard but only touches the one
//!   object it was given).
//! - Objects live in the arena as [`Slot`]s keyed by [`Oid`]. A slot's
//!   lifecycle mirrors its reference count: the first `add_reference` makes
//!   it Managed, the last `remove_reference` makes it Old. Old slots are
//!   reclaimed lazily by [`recycle`](Database::recycle), never eagerly, and
//!   never while any whole-database lock is held.
//! - The storage copy is authoritative for everything not resident: reads
//!   revive recycled objects from the backend on demand, and such revived
//!   objects enter as Old (persisted, unreferenced).
//! - Unbalanced reference releases are programmer errors and panic; they
//!   are deliberately not representable in [`DbError`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tempo_lock::{DatabaseLock, LockManager, LockMode};
use tempo_model::{DomainObject, ModelError, ObjectKind, ObjectRecord, Persistent};
use tempo_types::{Lifecycle, Oid, Principal};
use tracing::{debug, info, warn};

use crate::address::AddressHandle;
use crate::backend::StorageBackend;
use crate::config::DatabaseConfig;
use crate::error::{DbError, DbResult};
use crate::validator::{self, ValidationReport};

/// One resident object and its lifecycle bookkeeping.
#[derive(Clone)]
pub(crate) struct Slot {
    pub(crate) object: DomainObject,
    pub(crate) lifecycle: Lifecycle,
    pub(crate) ref_count: u32,
}

/// Copy of the in-memory graph taken at `begin`, restored by rollback.
pub(crate) struct GraphSnapshot {
    slots: HashMap<Oid, Slot>,
    roots: BTreeMap<ObjectKind, Vec<Oid>>,
}

pub(crate) struct DbInner {
    pub(crate) slots: HashMap<Oid, Slot>,
    /// Root-collection membership per root kind. Entries survive recycling;
    /// an oid listed here but not resident is revived from storage on use.
    pub(crate) roots: BTreeMap<ObjectKind, Vec<Oid>>,
    pub(crate) backend: Box<dyn StorageBackend>,
    pub(crate) open: bool,
    pub(crate) txn: Option<GraphSnapshot>,
    cache_ttl: Duration,
}

impl DbInner {
    pub(crate) fn require_open(&self) -> DbResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(DbError::DatabaseClosed)
        }
    }

    /// Make `oid` resident, reviving it from storage if it was recycled.
    /// Absence in both arena and storage is not an error here; lookups that
    /// need the object report [`DbError::NotLive`] themselves.
    pub(crate) fn ensure_resident(&mut self, oid: Oid) -> DbResult<()> {
        if self.slots.contains_key(&oid) {
            return Ok(());
        }
        if let Some(record) = self.backend.fetch(oid)? {
            let mut object = DomainObject::from_record(&record)?;
            apply_cache_ttl(&mut object, self.cache_ttl);
            debug!(%oid, kind = %record.kind, "revived object from storage");
            self.slots.insert(
                oid,
                Slot {
                    object,
                    lifecycle: Lifecycle::Old,
                    ref_count: 0,
                },
            );
        }
        Ok(())
    }

    fn slot(&self, oid: Oid) -> DbResult<&Slot> {
        self.slots.get(&oid).ok_or(DbError::NotLive(oid))
    }

    fn slot_mut(&mut self, oid: Oid) -> DbResult<&mut Slot> {
        self.slots.get_mut(&oid).ok_or(DbError::NotLive(oid))
    }

    /// Append `child` to the matching child list of `parent` and persist the
    /// rewritten parent record.
    fn link_child(&mut self, parent: Oid, child: Oid, child_kind: ObjectKind) -> DbResult<()> {
        let slot = self.slot_mut(parent)?;
        let parent_kind = slot.object.kind();
        let edge = parent_kind
            .aggregations()
            .iter()
            .find(|(_, k)| *k == child_kind)
            .map(|(edge, _)| *edge)
            .ok_or_else(|| {
                DbError::Model(ModelError::UnknownEdge {
                    kind: parent_kind,
                    edge: format!("<child {child_kind}>"),
                })
            })?;

        let mut edges = slot.object.aggregation_edges();
        let set = edges
            .iter_mut()
            .find(|set| set.edge == edge)
            .ok_or_else(|| {
                DbError::Model(ModelError::UnknownEdge {
                    kind: parent_kind,
                    edge: edge.to_string(),
                })
            })?;
        if !set.children.contains(&child) {
            set.children.push(child);
        }
        slot.object.set_aggregation_edges(&edges)?;

        let record = slot.object.serialize(parent);
        self.backend.update(&record)?;
        Ok(())
    }

    /// Invalidate derived caches on `oid` (a no-op for kinds without any).
    fn invalidate_cache(&mut self, oid: Oid) {
        if let Some(slot) = self.slots.get_mut(&oid) {
            slot.object.load_cached_properties();
        }
    }

    /// Subtree of `oid` in destruction order: every object appears before
    /// the parent that owns it.
    fn collect_subtree(&mut self, root: Oid) -> DbResult<Vec<(Oid, ObjectKind)>> {
        let mut order = Vec::new();
        let mut stack = vec![root];
        while let Some(oid) = stack.pop() {
            self.ensure_resident(oid)?;
            let slot = self.slot(oid)?;
            order.push((oid, slot.object.kind()));
            for set in slot.object.aggregation_edges() {
                stack.extend(set.children);
            }
        }
        // Parents were visited before their descendants; reverse so children
        // are destroyed first.
        order.reverse();
        Ok(order)
    }

    /// Null out every association (and child-list entry) pointing at
    /// `target`, persisting each referrer that changed.
    fn clear_references_to(&mut self, target: Oid) -> DbResult<()> {
        let mut dirty = Vec::new();
        for (&oid, slot) in self.slots.iter_mut() {
            let before = slot.object.serialize(oid);
            slot.object.clear_reference(target);
            let after = slot.object.serialize(oid);
            if after != before {
                dirty.push(after);
            }
        }
        for record in dirty {
            self.backend.update(&record)?;
        }
        Ok(())
    }
}

/// A connection to one time-tracking object store.
///
/// Thread-safe: share it behind an `Arc` and call from any thread. Whole-
/// database read/write claims come from [`lock`](Database::lock); the
/// internal arena mutex only serializes individual operations and is never
/// held across user code boundaries other than the `update` mutator.
pub struct Database {
    inner: Mutex<DbInner>,
    locks: LockManager,
    config: DatabaseConfig,
    address: AddressHandle,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    /// Open the store behind `backend`, registering a reference on
    /// `address`.
    ///
    /// Every record is loaded and indexed up front (objects enter as Old),
    /// then the whole graph is validated; a corrupt store refuses to open
    /// with [`DbError::DatabaseCorrupt`] naming the first violation.
    pub fn open(
        address: AddressHandle,
        mut backend: Box<dyn StorageBackend>,
        config: DatabaseConfig,
    ) -> DbResult<Database> {
        let records = backend.load_all()?;
        let mut slots = HashMap::with_capacity(records.len());
        let mut roots: BTreeMap<ObjectKind, Vec<Oid>> = BTreeMap::new();
        for record in &records {
            let mut object = DomainObject::from_record(record)?;
            apply_cache_ttl(&mut object, config.cache_ttl);
            if record.kind.is_root() {
                roots.entry(record.kind).or_default().push(record.oid);
            }
            slots.insert(
                record.oid,
                Slot {
                    object,
                    lifecycle: Lifecycle::Old,
                    ref_count: 0,
                },
            );
        }

        address.add_reference();
        let db = Database {
            inner: Mutex::new(DbInner {
                slots,
                roots,
                backend,
                open: true,
                txn: None,
                cache_ttl: config.cache_ttl,
            }),
            locks: LockManager::new(config.lock.clone()),
            config,
            address,
        };

        if let Err(err) = db.check_consistency() {
            db.close();
            return Err(err);
        }
        info!(
            objects = records.len(),
            path = %db.address.location().display(),
            "database opened"
        );
        Ok(db)
    }

    pub(crate) fn guard(&self) -> MutexGuard<'_, DbInner> {
        self.inner.lock().expect("database state poisoned")
    }

    /// The configuration this connection was opened with.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The storage address this connection holds a reference on.
    pub fn address(&self) -> &AddressHandle {
        &self.address
    }

    /// The whole-database lock manager, exposed for cooperating components
    /// (backup, reporting) that take claims directly.
    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    pub fn is_open(&self) -> bool {
        self.guard().open
    }

    /// Number of objects currently resident in the arena.
    pub fn resident_count(&self) -> usize {
        self.guard().slots.len()
    }

    /// The root collection for a root kind, in insertion order.
    pub fn roots(&self, kind: ObjectKind) -> Vec<Oid> {
        self.guard().roots.get(&kind).cloned().unwrap_or_default()
    }

    // -----------------------------------------------------------------------
    // CRUD
    // -----------------------------------------------------------------------

    /// Persist a new object, returning its freshly minted identity.
    ///
    /// The object enters the arena as New with a zero reference count. If it
    /// carries an aggregation parent backpointer, the parent's child list is
    /// extended and rewritten in the same operation, so the two sides of the
    /// edge never disagree in storage.
    pub fn create(&self, object: impl Into<DomainObject>) -> DbResult<Oid> {
        let mut object = object.into();
        apply_cache_ttl(&mut object, self.config.cache_ttl);

        let mut inner = self.guard();
        inner.require_open()?;
        let oid = Oid::random();
        let record = object.serialize(oid);

        if let Some(parent) = record.parent {
            inner.ensure_resident(parent)?;
            if !inner.slots.contains_key(&parent) {
                return Err(DbError::NotLive(parent));
            }
        }
        inner.backend.insert(&record)?;
        if let Some(parent) = record.parent {
            inner.link_child(parent, oid, record.kind)?;
        }
        if record.kind.is_root() {
            inner.roots.entry(record.kind).or_default().push(oid);
        }
        inner.slots.insert(
            oid,
            Slot {
                object,
                lifecycle: Lifecycle::New,
                ref_count: 0,
            },
        );
        debug!(%oid, kind = %record.kind, "object created");
        Ok(oid)
    }

    /// Read a copy of the object at `oid`, reviving it from storage if it
    /// was recycled.
    pub fn read(&self, oid: Oid, principal: &Principal) -> DbResult<DomainObject> {
        let mut inner = self.guard();
        inner.require_open()?;
        inner.ensure_resident(oid)?;
        let slot = inner.slot(oid)?;
        if !slot.object.can_read(principal) {
            return Err(DbError::AccessDenied {
                kind: slot.object.kind(),
                oid,
            });
        }
        Ok(slot.object.clone())
    }

    /// Apply `mutate` to the object at `oid` and persist the result.
    ///
    /// Aggregation backpointers are managed by `create` and `destroy`; a
    /// mutator that tries to reparent has the backpointer restored and a
    /// warning logged rather than leaving the two edge sides inconsistent.
    pub fn update(
        &self,
        oid: Oid,
        principal: &Principal,
        mutate: impl FnOnce(&mut DomainObject),
    ) -> DbResult<()> {
        let mut inner = self.guard();
        inner.require_open()?;
        inner.ensure_resident(oid)?;
        let slot = inner.slot_mut(oid)?;
        if !slot.object.can_modify(principal) {
            return Err(DbError::AccessDenied {
                kind: slot.object.kind(),
                oid,
            });
        }
        let held_parent = slot.object.parent();
        mutate(&mut slot.object);
        if slot.object.parent() != held_parent {
            warn!(%oid, "mutator attempted to reparent; backpointer restored");
            slot.object.set_parent(held_parent);
        }
        let record = slot.object.serialize(oid);
        inner.backend.update(&record)?;
        // Derived totals cached on the parent may now be stale.
        if let Some(parent) = record.parent {
            inner.invalidate_cache(parent);
        }
        Ok(())
    }

    /// Destroy the object at `oid`, its aggregated subtree (children first),
    /// and every association pointing at any destroyed object.
    ///
    /// Destroying an already-destroyed object reports
    /// [`DbError::NotLive`].
    pub fn destroy(&self, oid: Oid, principal: &Principal) -> DbResult<()> {
        let mut inner = self.guard();
        inner.require_open()?;
        inner.ensure_resident(oid)?;
        if !inner.slots.contains_key(&oid) {
            return Err(DbError::NotLive(oid));
        }
        let slot = inner.slot(oid)?;
        if !slot.object.can_destroy(principal) {
            return Err(DbError::AccessDenied {
                kind: slot.object.kind(),
                oid,
            });
        }

        let doomed = inner.collect_subtree(oid)?;
        for &(victim, kind) in &doomed {
            inner.backend.delete(victim, kind)?;
            inner.slots.remove(&victim);
            if let Some(collection) = inner.roots.get_mut(&kind) {
                collection.retain(|&member| member != victim);
            }
        }
        // With the subtree gone, scrub the survivors' edges. This also drops
        // the destroyed object from its parent's child list.
        for &(victim, _) in &doomed {
            inner.clear_references_to(victim)?;
        }
        debug!(%oid, cascade = doomed.len(), "object destroyed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reference counting and recycling
    // -----------------------------------------------------------------------

    /// Register an in-memory holder of `oid`. The first reference makes the
    /// object Managed and pins it against recycling.
    pub fn add_reference(&self, oid: Oid) -> DbResult<()> {
        let mut inner = self.guard();
        inner.require_open()?;
        inner.ensure_resident(oid)?;
        let slot = inner.slot_mut(oid)?;
        slot.ref_count += 1;
        if slot.ref_count == 1 {
            slot.lifecycle = slot.lifecycle.on_acquire();
        }
        Ok(())
    }

    /// Release one holder of `oid`. Dropping the count to zero makes the
    /// object Old (eligible for lazy recycling).
    ///
    /// # Panics
    ///
    /// Panics on an unbalanced release: releasing an object with no
    /// outstanding references (including one already destroyed) is a
    /// programmer error, not a recoverable condition.
    pub fn remove_reference(&self, oid: Oid) -> DbResult<()> {
        let mut inner = self.guard();
        inner.require_open()?;
        let slot = inner
            .slots
            .get_mut(&oid)
            .unwrap_or_else(|| panic!("remove_reference on non-resident object {oid}"));
        assert!(
            slot.ref_count > 0,
            "remove_reference on object {oid} with zero references"
        );
        slot.ref_count -= 1;
        if slot.ref_count == 0 {
            slot.lifecycle = slot.lifecycle.on_release();
        }
        Ok(())
    }

    /// Lifecycle state of the object at `oid`.
    pub fn lifecycle_of(&self, oid: Oid) -> DbResult<Lifecycle> {
        let inner = self.guard();
        inner.require_open()?;
        Ok(inner.slot(oid)?.lifecycle)
    }

    /// Outstanding reference count of the object at `oid`.
    pub fn reference_count(&self, oid: Oid) -> DbResult<u32> {
        let inner = self.guard();
        inner.require_open()?;
        Ok(inner.slot(oid)?.ref_count)
    }

    /// Returns `true` if `oid` names an object that exists and has not been
    /// destroyed — resident or recycled-but-persisted. `false` on a closed
    /// connection.
    pub fn is_live(&self, oid: Oid) -> bool {
        let inner = self.guard();
        if !inner.open {
            return false;
        }
        inner.slots.contains_key(&oid) || inner.backend.contains(oid).unwrap_or(false)
    }

    /// Drop every Old slot from the arena. The storage copies remain and are
    /// revived on demand.
    ///
    /// Recycling is suspended while any whole-database claim is held: claim
    /// holders may still be walking Old objects. Returns the number of slots
    /// reclaimed (zero while suspended).
    pub fn recycle(&self) -> DbResult<usize> {
        let mut inner = self.guard();
        inner.require_open()?;
        if self.locks.lock_count() > 0 {
            debug!("recycling suspended while database claims are held");
            return Ok(0);
        }
        let before = inner.slots.len();
        inner
            .slots
            .retain(|_, slot| slot.lifecycle != Lifecycle::Old);
        let reclaimed = before - inner.slots.len();
        if reclaimed > 0 {
            debug!(reclaimed, "recycled unreferenced objects");
        }
        Ok(reclaimed)
    }

    // -----------------------------------------------------------------------
    // Derived properties
    // -----------------------------------------------------------------------

    /// Total worked minutes booked against the workload at `oid`.
    ///
    /// Served from the workload's cache cell within its TTL; reads inside
    /// the window may return a value up to one TTL stale. Updating any of
    /// the workload's work units through this connection invalidates the
    /// cell immediately.
    pub fn workload_total_minutes(&self, oid: Oid) -> DbResult<i64> {
        let mut inner = self.guard();
        inner.require_open()?;
        inner.ensure_resident(oid)?;
        let units = match &inner.slot(oid)?.object {
            DomainObject::Workload(w) => w.work_units.clone(),
            other => {
                return Err(DbError::Model(ModelError::KindMismatch {
                    record: other.kind(),
                    object: ObjectKind::Workload,
                    oid,
                }))
            }
        };

        let mut total = 0i64;
        for unit in units {
            inner.ensure_resident(unit)?;
            match inner.slots.get(&unit) {
                Some(Slot {
                    object: DomainObject::WorkUnit(w),
                    ..
                }) => total += w.duration_minutes(),
                _ => return Err(DbError::NotLive(unit)),
            }
        }

        let slot = inner.slot_mut(oid)?;
        let DomainObject::Workload(workload) = &mut slot.object else {
            unreachable!("kind checked above");
        };
        // The cache decides what is returned: a fresh cell wins over the
        // just-computed sum, which is the staleness the TTL permits.
        Ok(*workload
            .total_minutes
            .value_with(|cell| cell.set_value(total)))
    }

    // -----------------------------------------------------------------------
    // Locking, validation, shutdown
    // -----------------------------------------------------------------------

    /// Take a whole-database claim. Blocks up to the configured acquisition
    /// timeout.
    pub fn lock(&self, mode: LockMode) -> DbResult<DatabaseLock> {
        self.guard().require_open()?;
        Ok(self.locks.acquire(mode)?)
    }

    /// Run the graph validator and report every violation found.
    pub fn validate(&self) -> DbResult<ValidationReport> {
        let inner = self.guard();
        inner.require_open()?;
        validator::validate_graph(&inner)
    }

    /// Run the validator and fail fast on the first violation.
    pub fn check_consistency(&self) -> DbResult<()> {
        let report = self.validate()?;
        match report.issues.first() {
            None => Ok(()),
            Some(issue) => Err(DbError::DatabaseCorrupt {
                kind: issue.kind,
                oid: issue.oid,
                reason: issue.reason.clone(),
            }),
        }
    }

    /// Close the connection: roll back any open transaction, orphan
    /// outstanding lock tokens, drop the arena, and release the address
    /// reference. Idempotent; operations after close report
    /// [`DbError::DatabaseClosed`].
    pub fn close(&self) {
        let mut inner = self.guard();
        if !inner.open {
            return;
        }
        inner.open = false;
        if inner.txn.take().is_some() {
            warn!("connection closed with an open transaction; rolling back");
            if let Err(err) = inner.backend.rollback() {
                warn!(error = %err, "rollback during close failed");
            }
        }
        inner.slots.clear();
        inner.roots.clear();
        drop(inner);
        self.locks.close();
        self.address.remove_reference();
        info!(path = %self.address.location().display(), "database closed");
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        // Close if the caller didn't; teardown must never panic, so a
        // poisoned arena is simply abandoned.
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        if !inner.open {
            return;
        }
        inner.open = false;
        if inner.txn.take().is_some() {
            let _ = inner.backend.rollback();
        }
        drop(inner);
        self.locks.close();
        self.address.remove_reference();
    }
}

/// Derived-property cache cells honor the connection's configured TTL.
fn apply_cache_ttl(object: &mut DomainObject, ttl: Duration) {
    if let DomainObject::Workload(w) = object {
        w.total_minutes.set_ttl(ttl);
    }
}

pub(crate) fn snapshot(inner: &DbInner) -> GraphSnapshot {
    GraphSnapshot {
        slots: inner.slots.clone(),
        roots: inner.roots.clone(),
    }
}

pub(crate) fn restore(inner: &mut DbInner, snapshot: GraphSnapshot) {
    inner.slots = snapshot.slots;
    inner.roots = snapshot.roots;
}
