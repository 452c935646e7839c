//! Database core for the Tempo storage engine.
//!
//! A [`Database`] is a connection to one object store: it loads every record
//! through a pluggable [`StorageBackend`], keeps live objects in a slot
//! arena keyed by object identity, and mediates all access — CRUD with
//! capability checks, reference counting with lazy recycling, whole-database
//! claims, transactions with rollback-on-drop, and structural validation of
//! the whole graph.
//!
//! # Key Types
//!
//! - [`Database`] — the connection and object arena
//! - [`StorageBackend`] — seam to a concrete persistence strategy
//! - [`Transaction`] — unit of work; rolls back when dropped unfinished
//! - [`AddressRegistry`] / [`AddressHandle`] — one handle per storage
//!   location, reference counted
//! - [`ValidationReport`] — outcome of a validator pass
//! - [`InMemoryBackend`] / [`SharedBackend`] — reference backends for tests
//!   and embedding
//!
//! # Design Rules
//!
//! - Storage is authoritative; the arena is an index over it. Recycling an
//!   unreferenced object never loses data, and reads revive recycled
//!   objects on demand.
//! - Recoverable failures are [`DbError`]; programmer errors (unbalanced
//!   reference release) panic.
//! - Validation runs at load, on demand, and — when configured — before
//!   every commit.

pub mod address;
pub mod backend;
pub mod config;
pub mod database;
pub mod error;
pub mod memory;
pub mod transaction;
pub mod validator;

pub use address::{AddressHandle, AddressRegistry};
pub use backend::StorageBackend;
pub use config::DatabaseConfig;
pub use database::Database;
pub use error::{DbError, DbResult};
pub use memory::{InMemoryBackend, SharedBackend};
pub use transaction::Transaction;
pub use validator::ValidationReport;
