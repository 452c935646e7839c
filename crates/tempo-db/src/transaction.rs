//! Transaction controller: at most one open transaction per connection,
//! rollback on drop.

use tracing::{debug, warn};

use crate::database::{self, Database};
use crate::error::{DbError, DbResult};

/// A unit of work spanning multiple object operations.
///
/// Obtained from [`Database::begin`]. Operations performed on the database
/// while the transaction is open are journaled by the storage backend and
/// shadowed by an in-memory graph snapshot; [`commit`](Transaction::commit)
/// makes them durable, [`rollback`](Transaction::rollback) discards them,
/// and dropping an unfinished transaction rolls back (logged, never
/// panicking — the safe interpretation of an unwind mid-transaction).
pub struct Transaction<'db> {
    db: &'db Database,
    finished: bool,
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open a transaction on this connection.
    ///
    /// Fails with [`DbError::TransactionAlreadyInProgress`] while another
    /// transaction is open.
    pub fn begin(&self) -> DbResult<Transaction<'_>> {
        let mut inner = self.guard();
        inner.require_open()?;
        if inner.txn.is_some() {
            return Err(DbError::TransactionAlreadyInProgress);
        }
        inner.backend.begin()?;
        let snapshot = database::snapshot(&inner);
        inner.txn = Some(snapshot);
        debug!("transaction opened");
        Ok(Transaction {
            db: self,
            finished: false,
        })
    }
}

impl Transaction<'_> {
    /// Make every operation since `begin` durable.
    ///
    /// With `validate_on_commit` configured, the validator runs first; a
    /// violation fails the commit with [`DbError::DatabaseCorrupt`] and
    /// leaves the transaction open, so the caller (or the drop guard) rolls
    /// the bad state back. Idempotent once the transaction is finished.
    pub fn commit(&mut self) -> DbResult<()> {
        if self.finished {
            return Ok(());
        }
        if self.db.config().validate_on_commit {
            self.db.check_consistency()?;
        }
        let mut inner = self.db.guard();
        inner.require_open()?;
        inner.backend.commit()?;
        inner.txn = None;
        self.finished = true;
        debug!("transaction committed");
        Ok(())
    }

    /// Discard every operation since `begin`, restoring both the storage
    /// content and the in-memory graph. Idempotent once finished; a no-op
    /// on a connection that was closed underneath the transaction (close
    /// already rolled back).
    pub fn rollback(&mut self) -> DbResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        let mut inner = self.db.guard();
        if !inner.open {
            return Ok(());
        }
        let snapshot = inner
            .txn
            .take()
            .expect("unfinished transaction holds a snapshot");
        database::restore(&mut inner, snapshot);
        inner.backend.rollback()?;
        debug!("transaction rolled back");
        Ok(())
    }

    /// Returns `true` once the transaction has committed or rolled back.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        warn!("transaction dropped without commit; rolling back");
        if let Err(err) = self.rollback() {
            // Unwind safety: drop must not panic over a failed rollback.
            warn!(error = %err, "rollback on drop failed");
        }
    }
}
