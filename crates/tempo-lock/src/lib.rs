//! Whole-database lock manager for the Tempo storage core.
//!
//! A database is locked as a unit: multiple ReadOnly claims from any thread
//! or process may coexist, while a ReadWrite claim excludes every owner pair
//! except its own. Holding any claim suspends object recycling database-wide,
//! which is the principal reason this crate exists — it keeps in-memory
//! references to Old objects dereferenceable for the duration of backups,
//! restores, and report snapshots.
//!
//! # Pieces
//!
//! - [`LockManager`] / [`DatabaseLock`] — in-process claim table with FIFO
//!   wakeup and orphaning on close
//! - [`LockFile`] — the advisory cross-process protocol at the storage
//!   location
//! - [`LockConfig`] — bounded-wait configuration (the bound is the caller's,
//!   not hard-coded here)

pub mod config;
pub mod error;
pub mod lockfile;
pub mod manager;

pub use config::LockConfig;
pub use error::{LockError, LockResult};
pub use lockfile::LockFile;
pub use manager::{DatabaseLock, LockManager, LockMode, LockOwner};
