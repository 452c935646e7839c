use tempo_types::{Oid, Principal};

use crate::error::{ModelError, ModelResult};
use crate::kind::ObjectKind;
use crate::record::{ChildSet, MultiRef, ObjectRecord, PropertyMap, SingleRef};

/// Read-only view of the object graph, supplied to validation hooks.
///
/// Implemented by the database over its live-object index. Kept narrow so
/// objects can check their edges without reaching into database internals.
pub trait GraphView {
    /// Kind of the object at `oid`, or `None` if it is not indexed.
    fn kind_of(&self, oid: Oid) -> Option<ObjectKind>;

    /// Returns `true` if `oid` is indexed and live.
    fn is_live(&self, oid: Oid) -> bool;

    /// Aggregation parent of `oid`, if any.
    fn parent_of(&self, oid: Oid) -> Option<Oid>;

    /// Returns `true` if `parent` lists `child` under the given edge.
    fn has_child(&self, parent: Oid, edge: &str, child: Oid) -> bool;
}

/// One invariant violation found during validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    pub oid: Oid,
    pub kind: ObjectKind,
    pub reason: String,
}

impl ValidationIssue {
    pub fn new(oid: Oid, kind: ObjectKind, reason: impl Into<String>) -> Self {
        Self {
            oid,
            kind,
            reason: reason.into(),
        }
    }
}

/// The base persistent-object contract.
///
/// The owning database drives these hooks in a fixed order during load,
/// save, and validate passes:
///
/// 1. `load_cached_properties`
/// 2. `serialize_properties` / `apply_properties`
/// 3. `aggregation_edges` / `set_aggregation_edges` (owned children)
/// 4. `association_edges` / `set_association_edges` (cross-references)
/// 5. `validate`
///
/// The provided [`serialize`](Persistent::serialize) and
/// [`deserialize_into`](Persistent::deserialize_into) template methods
/// enforce that order; concrete types implement the per-step hooks only.
pub trait Persistent {
    /// The concrete kind of this object.
    fn kind(&self) -> ObjectKind;

    /// Refresh any cached derived properties before serialization.
    fn load_cached_properties(&mut self) {}

    /// Write scalar properties into `props`.
    fn serialize_properties(&self, props: &mut PropertyMap);

    /// Fill scalar properties from a record.
    fn apply_properties(&mut self, record: &ObjectRecord) -> ModelResult<()>;

    /// Aggregation parent backpointer; `None` for root-collection kinds.
    fn parent(&self) -> Option<Oid> {
        None
    }

    /// Set the aggregation parent backpointer.
    fn set_parent(&mut self, _parent: Option<Oid>) {}

    /// Parent-side lists of owned children.
    fn aggregation_edges(&self) -> Vec<ChildSet> {
        Vec::new()
    }

    /// Restore parent-side child lists.
    fn set_aggregation_edges(&mut self, _edges: &[ChildSet]) -> ModelResult<()> {
        Ok(())
    }

    /// Outgoing association edges (single-valued, multi-valued).
    fn association_edges(&self) -> (Vec<SingleRef>, Vec<MultiRef>) {
        (Vec::new(), Vec::new())
    }

    /// Restore outgoing association edges.
    fn set_association_edges(
        &mut self,
        _single: &[SingleRef],
        _multi: &[MultiRef],
    ) -> ModelResult<()> {
        Ok(())
    }

    /// Object-specific invariant checks beyond the structural ones the
    /// validator performs for every object. Push violations into `issues`.
    fn validate(&self, _oid: Oid, _graph: &dyn GraphView, _issues: &mut Vec<ValidationIssue>) {}

    /// Null out any association pointing at `target` (called when `target`
    /// is destroyed).
    fn clear_reference(&mut self, _target: Oid) {}

    /// Access-control hook: may `principal` read this object?
    fn can_read(&self, _principal: &Principal) -> bool {
        true
    }

    /// Access-control hook: may `principal` modify this object?
    fn can_modify(&self, _principal: &Principal) -> bool {
        true
    }

    /// Access-control hook: may `principal` destroy this object?
    fn can_destroy(&self, _principal: &Principal) -> bool {
        true
    }

    /// Template method: encode this object into its backend-neutral record,
    /// invoking the hooks in the fixed serialization order.
    fn serialize(&mut self, oid: Oid) -> ObjectRecord {
        self.load_cached_properties();
        let mut record = ObjectRecord::new(oid, self.kind());
        record.parent = self.parent();
        self.serialize_properties(&mut record.properties);
        record.aggregations = self.aggregation_edges();
        let (single, multi) = self.association_edges();
        record.references = single;
        record.reference_lists = multi;
        record
    }

    /// Template method: fill this object from a record, invoking the hooks
    /// in the fixed deserialization order.
    fn deserialize_into(&mut self, record: &ObjectRecord) -> ModelResult<()> {
        if record.kind != self.kind() {
            return Err(ModelError::KindMismatch {
                record: record.kind,
                object: self.kind(),
                oid: record.oid,
            });
        }
        self.apply_properties(record)?;
        self.set_parent(record.parent);
        self.set_aggregation_edges(&record.aggregations)?;
        self.set_association_edges(&record.references, &record.reference_lists)?;
        Ok(())
    }
}
