//! Row-oriented serializer for the Tempo storage engine.
//!
//! Persistent objects become rows: one table per kind, join tables for
//! multi-valued associations, and SQL assembled as opaque text over the
//! narrow [`SqlEngine`] seam. [`SqlBackend`] plugs the whole layer into the
//! database core as a [`StorageBackend`](tempo_db::StorageBackend).
//!
//! # Key Types
//!
//! - [`SqlEngine`] — the dialect seam: statement execution, transaction
//!   primitives, `is_keyword`/`quote_identifier`
//! - [`SqlBackend`] — relational [`StorageBackend`](tempo_db::StorageBackend)
//!   over any engine
//! - [`MemoryEngine`] — in-memory reference engine for tests and embedding
//!
//! # Design Rules
//!
//! - The engine never sees the object model and the serializer never sees
//!   the dialect; statement text is the only thing that crosses the seam.
//! - Parent-side child lists are implicit in the children's backpointer
//!   columns and come back in oid order; everything else round-trips
//!   exactly.

pub mod backend;
pub mod engine;
pub mod error;
pub mod schema;
pub mod serializer;
pub mod writer;

pub use backend::SqlBackend;
pub use engine::{MemoryEngine, ResultSet, Row, RowId, SqlEngine};
pub use error::{SqlError, SqlResult};
