use tempo_types::{Oid, TypeError};
use thiserror::Error;

use crate::kind::ObjectKind;

/// Errors produced while encoding or decoding object records.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    /// A required property is absent from the record.
    #[error("{kind} record is missing property '{name}'")]
    MissingProperty { kind: ObjectKind, name: String },

    /// A property is present but holds a value of the wrong type.
    #[error("{kind} property '{name}' has the wrong type (expected {expected})")]
    PropertyType {
        kind: ObjectKind,
        name: String,
        expected: String,
    },

    /// The record carries an edge name the kind does not define.
    #[error("{kind} record carries unknown edge '{edge}'")]
    UnknownEdge { kind: ObjectKind, edge: String },

    /// The type discriminator does not name a known object kind.
    #[error("unknown object kind tag '{0}'")]
    UnknownKind(String),

    /// A record's kind does not match the object it is applied to.
    #[error("record for {record} applied to {object} object {oid}")]
    KindMismatch {
        record: ObjectKind,
        object: ObjectKind,
        oid: Oid,
    },

    /// Textual parse failure (delegated to the shared type errors).
    #[error(transparent)]
    Type(#[from] TypeError),
}

/// Result alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
