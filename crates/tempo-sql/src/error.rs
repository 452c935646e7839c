use tempo_db::DbError;
use tempo_model::ModelError;
use tempo_types::TypeError;
use thiserror::Error;

/// Errors surfaced by the relational serializer and engine surface.
#[derive(Debug, Error)]
pub enum SqlError {
    /// A statement names a table the engine does not know.
    #[error("unknown table '{0}'")]
    UnknownTable(String),

    /// A result row is missing an expected column.
    #[error("table '{table}' row is missing column '{column}'")]
    MissingColumn { table: String, column: String },

    /// A NULL cell where the schema requires a value.
    #[error("table '{table}' column '{column}' is unexpectedly NULL")]
    UnexpectedNull { table: String, column: String },

    /// Malformed SQL or cell text (carries input and byte offset).
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Record encode/decode failure.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The storage medium ran out of space.
    #[error("disk full")]
    DiskFull,

    /// Engine I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for relational operations.
pub type SqlResult<T> = Result<T, SqlError>;

impl From<SqlError> for DbError {
    fn from(err: SqlError) -> Self {
        match err {
            SqlError::Type(e) => DbError::Model(ModelError::Type(e)),
            SqlError::Model(e) => DbError::Model(e),
            SqlError::DiskFull => DbError::DiskFull,
            SqlError::Io(e) => DbError::Io(e),
            other => DbError::Io(std::io::Error::other(other.to_string())),
        }
    }
}
