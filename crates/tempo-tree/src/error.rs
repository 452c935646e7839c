use tempo_db::DbError;
use tempo_model::ModelError;
use tempo_types::{Oid, TypeError};
use thiserror::Error;

/// Errors surfaced by the tree serializer and backend surface.
#[derive(Debug, Error)]
pub enum TreeError {
    /// An element is missing a required attribute.
    #[error("element '{element}' is missing attribute '{attribute}'")]
    MissingAttribute { element: String, attribute: String },

    /// A nested element does not match any aggregation edge of its parent.
    #[error("element '{parent}' does not aggregate '{child}' elements")]
    UnexpectedElement { parent: String, child: String },

    /// An element the operation needs is not in the document.
    #[error("no element for object {0}")]
    MissingObject(Oid),

    /// A parent lists a child that is not among the given records.
    #[error("object {parent} lists missing child {child}")]
    MissingChild { parent: Oid, child: Oid },

    /// Malformed attribute text (carries input and byte offset).
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Record encode/decode failure.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The document file does not hold a well-formed element tree.
    #[error("malformed document: {0}")]
    Document(#[from] serde_json::Error),

    /// The storage medium ran out of space.
    #[error("disk full")]
    DiskFull,

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;

impl From<TreeError> for DbError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::Type(e) => DbError::Model(ModelError::Type(e)),
            TreeError::Model(e) => DbError::Model(e),
            TreeError::DiskFull => DbError::DiskFull,
            TreeError::Io(e) => DbError::Io(e),
            other => DbError::Io(std::io::Error::other(other.to_string())),
        }
    }
}
