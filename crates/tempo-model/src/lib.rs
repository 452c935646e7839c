//! Object model for the Tempo persistent-object storage core.
//!
//! This crate defines the base persistent-object abstraction and the
//! concrete time-tracking domain objects that the database and both
//! serializer backends operate on.
//!
//! # Key Pieces
//!
//! - [`Persistent`] — the hook trait every stored object implements; its
//!   template methods fix the serialize/deserialize hook order
//! - [`ObjectRecord`] — the backend-neutral encoded form shared by the
//!   row-oriented and tree-oriented serializers
//! - [`ObjectKind`] — type discriminator plus the edge schema (aggregations,
//!   associations, parent kinds) both backends and the validator consult
//! - [`DomainObject`] — tagged union over the concrete object types
//!
//! # Design Rules
//!
//! 1. Hooks run in a fixed order: cached properties, properties,
//!    aggregations, associations, validate.
//! 2. Aggregation children cannot outlive their parent; associations are
//!    non-owning and are nulled when their target is destroyed.
//! 3. Objects never touch storage directly — they encode to and decode from
//!    [`ObjectRecord`] only.

pub mod domain;
pub mod error;
pub mod kind;
pub mod objects;
pub mod record;
pub mod traits;

pub use domain::DomainObject;
pub use error::{ModelError, ModelResult};
pub use kind::{ObjectKind, PropertySpec, ALL_KINDS};
pub use objects::{
    Account, Activity, ActivityCore, ActivityLike, ActivityType, Event, Project, Task, User,
    WorkUnit, Workload,
};
pub use record::{
    ChildSet, MultiRef, ObjectRecord, PropertyKind, PropertyMap, PropertyValue, SingleRef,
};
pub use traits::{GraphView, Persistent, ValidationIssue};
