use tempo_lock::LockError;
use tempo_model::{ModelError, ObjectKind};
use tempo_types::Oid;
use thiserror::Error;

/// Errors surfaced by database operations.
///
/// Everything here is recoverable by the caller. Programmer errors
/// (unbalanced reference release, cache loaders that set nothing) panic
/// instead and are deliberately absent from this taxonomy.
#[derive(Debug, Error)]
pub enum DbError {
    /// Operation on a destroyed (or never-known) object.
    #[error("object {0} is not live")]
    NotLive(Oid),

    /// Operation on a closed database connection.
    #[error("database is closed")]
    DatabaseClosed,

    /// An access-control hook rejected the call.
    #[error("access denied for {kind} object {oid}")]
    AccessDenied { kind: ObjectKind, oid: Oid },

    /// A transaction is already open on this connection.
    #[error("a transaction is already in progress")]
    TransactionAlreadyInProgress,

    /// The validator detected an invariant violation.
    #[error("database corrupt: {kind} object {oid}: {reason}")]
    DatabaseCorrupt {
        kind: ObjectKind,
        oid: Oid,
        reason: String,
    },

    /// Lock manager failure (timeout, closed manager).
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Record encode/decode failure (includes parse errors with offsets).
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The storage medium ran out of space.
    #[error("disk full")]
    DiskFull,

    /// Backend storage failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
