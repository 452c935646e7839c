use thiserror::Error;

/// Errors from lock acquisition and the advisory lock-file protocol.
#[derive(Debug, Error)]
pub enum LockError {
    /// The requested lock could not be granted within the configured wait.
    #[error("lock not granted within {waited_ms} ms")]
    Timeout { waited_ms: u64 },

    /// The lock manager belongs to a closed or destroyed database.
    #[error("database is closed")]
    Closed,

    /// I/O failure while manipulating the advisory lock file.
    #[error("lock file I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for lock operations.
pub type LockResult<T> = Result<T, LockError>;
