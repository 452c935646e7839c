use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::ThreadId;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::LockConfig;
use crate::error::{LockError, LockResult};

/// The two whole-database claim modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockMode {
    ReadOnly,
    ReadWrite,
}

/// The (process, thread) pair that owns a claim.
///
/// Exclusivity rules compare owners as pairs: a ReadWrite claim excludes
/// every *other* pair but admits further claims from the same pair, which is
/// what gives nested property access its reentrancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LockOwner {
    pub process: u32,
    pub thread: ThreadId,
}

impl LockOwner {
    /// The owner pair for the calling thread.
    pub fn current() -> Self {
        Self {
            process: std::process::id(),
            thread: std::thread::current().id(),
        }
    }
}

struct Holder {
    id: u64,
    owner: LockOwner,
    mode: LockMode,
}

struct Waiter {
    ticket: u64,
    owner: LockOwner,
    mode: LockMode,
}

struct LockState {
    holders: Vec<Holder>,
    queue: VecDeque<Waiter>,
    next_id: u64,
    closed: bool,
}

impl LockState {
    /// Grant rules from the claim protocol:
    /// - ReadWrite: grantable iff every existing holder is the same pair.
    /// - ReadOnly: grantable unless a *different* pair holds ReadWrite.
    fn grantable(&self, owner: LockOwner, mode: LockMode) -> bool {
        match mode {
            LockMode::ReadWrite => self.holders.iter().all(|h| h.owner == owner),
            LockMode::ReadOnly => self
                .holders
                .iter()
                .all(|h| h.mode == LockMode::ReadOnly || h.owner == owner),
        }
    }

    fn holds_any(&self, owner: LockOwner) -> bool {
        self.holders.iter().any(|h| h.owner == owner)
    }
}

struct Inner {
    state: Mutex<LockState>,
    cond: Condvar,
    config: LockConfig,
}

/// Whole-database read/write lock manager.
///
/// Tracks claims by (process, thread) owner pair, parks contested requests
/// on a FIFO ticket queue, and orphans outstanding tokens when the database
/// closes. While any claim is held, object recycling is suspended
/// database-wide ([`lock_count`](LockManager::lock_count) is the signal the
/// database's recycler checks), which is what keeps in-memory pointers to
/// Old objects dereferenceable for backup and report snapshots.
#[derive(Clone)]
pub struct LockManager {
    inner: Arc<Inner>,
}

impl LockManager {
    pub fn new(config: LockConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(LockState {
                    holders: Vec::new(),
                    queue: VecDeque::new(),
                    next_id: 1,
                    closed: false,
                }),
                cond: Condvar::new(),
                config,
            }),
        }
    }

    /// Acquire a claim for the calling thread's owner pair.
    pub fn acquire(&self, mode: LockMode) -> LockResult<DatabaseLock> {
        self.acquire_as(LockOwner::current(), mode)
    }

    /// Acquire a claim for an explicit owner pair.
    ///
    /// The public entry point for cooperating components that track their
    /// own ownership (and for exclusion tests, which simulate foreign
    /// processes this way).
    pub fn acquire_as(&self, owner: LockOwner, mode: LockMode) -> LockResult<DatabaseLock> {
        let deadline = Instant::now() + self.inner.config.acquire_timeout;
        let mut state = self.inner.state.lock().expect("lock state poisoned");
        if state.closed {
            return Err(LockError::Closed);
        }

        // Fast path: grant immediately when nothing conflicts and either no
        // one is queued or the owner already holds a claim (reentrant
        // requests must not park behind foreign waiters, or a holder could
        // deadlock against its own queue).
        if state.grantable(owner, mode) && (state.queue.is_empty() || state.holds_any(owner)) {
            return Ok(self.grant(&mut state, owner, mode));
        }

        let ticket = state.next_id;
        state.next_id += 1;
        state.queue.push_back(Waiter {
            ticket,
            owner,
            mode,
        });
        debug!(?mode, ticket, "lock contested, queued");

        loop {
            let now = Instant::now();
            if now >= deadline {
                state.queue.retain(|w| w.ticket != ticket);
                // Our slot at the head may have been blocking others.
                self.inner.cond.notify_all();
                let waited_ms = self.inner.config.acquire_timeout.as_millis() as u64;
                return Err(LockError::Timeout { waited_ms });
            }
            let (next_state, timeout) = self
                .inner
                .cond
                .wait_timeout(state, deadline - now)
                .expect("lock state poisoned");
            state = next_state;

            if state.closed {
                state.queue.retain(|w| w.ticket != ticket);
                return Err(LockError::Closed);
            }
            let at_front = state.queue.front().map(|w| w.ticket) == Some(ticket);
            if at_front && state.grantable(owner, mode) {
                state.queue.pop_front();
                let lock = self.grant(&mut state, owner, mode);
                // The next waiter may also be grantable (e.g. a run of
                // readers).
                self.inner.cond.notify_all();
                return Ok(lock);
            }
            if timeout.timed_out() {
                state.queue.retain(|w| w.ticket != ticket);
                self.inner.cond.notify_all();
                let waited_ms = self.inner.config.acquire_timeout.as_millis() as u64;
                return Err(LockError::Timeout { waited_ms });
            }
        }
    }

    fn grant(&self, state: &mut LockState, owner: LockOwner, mode: LockMode) -> DatabaseLock {
        let id = state.next_id;
        state.next_id += 1;
        state.holders.push(Holder { id, owner, mode });
        debug!(?mode, id, holders = state.holders.len(), "lock granted");
        DatabaseLock {
            inner: Arc::clone(&self.inner),
            id,
            mode,
            released: false,
        }
    }

    /// Number of claims currently held. Non-zero suspends recycling.
    pub fn lock_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .expect("lock state poisoned")
            .holders
            .len()
    }

    /// Returns `true` if a ReadWrite claim is currently held.
    pub fn write_locked(&self) -> bool {
        self.inner
            .state
            .lock()
            .expect("lock state poisoned")
            .holders
            .iter()
            .any(|h| h.mode == LockMode::ReadWrite)
    }

    /// Orphan all outstanding tokens: their release becomes a no-op, queued
    /// waiters fail with [`LockError::Closed`], and further acquisition is
    /// refused. Called when the owning database closes or is destroyed.
    pub fn close(&self) {
        let mut state = self.inner.state.lock().expect("lock state poisoned");
        if state.closed {
            return;
        }
        state.closed = true;
        if !state.holders.is_empty() {
            warn!(
                orphaned = state.holders.len(),
                "database closed with outstanding locks"
            );
        }
        state.holders.clear();
        self.inner.cond.notify_all();
    }

    /// Returns `true` once [`close`](LockManager::close) has run.
    pub fn is_closed(&self) -> bool {
        self.inner.state.lock().expect("lock state poisoned").closed
    }
}

/// A granted whole-database claim. Releases on drop; release on a closed
/// manager is a silent no-op (the token is orphaned), never an error.
pub struct DatabaseLock {
    inner: Arc<Inner>,
    id: u64,
    mode: LockMode,
    released: bool,
}

impl std::fmt::Debug for DatabaseLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseLock")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl DatabaseLock {
    /// The mode this token was granted with.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Release explicitly. Equivalent to dropping the token.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut state = match self.inner.state.lock() {
            Ok(state) => state,
            // Teardown must never panic; a poisoned manager is abandoned.
            Err(_) => return,
        };
        if state.closed {
            return;
        }
        state.holders.retain(|h| h.id != self.id);
        // All waiters re-check; when the last claim goes, recycling resumes.
        self.inner.cond.notify_all();
    }
}

impl Drop for DatabaseLock {
    fn drop(&mut self) {
        self.release_inner();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn manager() -> LockManager {
        LockManager::new(LockConfig::default())
    }

    fn impatient() -> LockManager {
        LockManager::new(LockConfig {
            acquire_timeout: Duration::from_millis(50),
            ..LockConfig::default()
        })
    }

    // -----------------------------------------------------------------------
    // Grant rules
    // -----------------------------------------------------------------------

    #[test]
    fn read_locks_share() {
        let mgr = manager();
        let a = mgr.acquire(LockMode::ReadOnly).unwrap();
        let b = mgr.acquire(LockMode::ReadOnly).unwrap();
        assert_eq!(mgr.lock_count(), 2);
        drop(a);
        drop(b);
        assert_eq!(mgr.lock_count(), 0);
    }

    #[test]
    fn same_pair_nests_write_locks() {
        let mgr = manager();
        let outer = mgr.acquire(LockMode::ReadWrite).unwrap();
        let inner = mgr.acquire(LockMode::ReadWrite).unwrap();
        let read = mgr.acquire(LockMode::ReadOnly).unwrap();
        assert_eq!(mgr.lock_count(), 3);
        drop(read);
        drop(inner);
        drop(outer);
    }

    #[test]
    fn write_lock_blocks_other_threads() {
        let mgr = impatient();
        let held = mgr.acquire(LockMode::ReadWrite).unwrap();

        let mgr2 = mgr.clone();
        let blocked = thread::spawn(move || mgr2.acquire(LockMode::ReadOnly));
        let err = blocked.join().unwrap().unwrap_err();
        assert!(matches!(err, LockError::Timeout { .. }));
        drop(held);
    }

    #[test]
    fn write_lock_blocks_other_write() {
        let mgr = impatient();
        let held = mgr.acquire(LockMode::ReadWrite).unwrap();

        let mgr2 = mgr.clone();
        let blocked = thread::spawn(move || mgr2.acquire(LockMode::ReadWrite));
        assert!(matches!(
            blocked.join().unwrap().unwrap_err(),
            LockError::Timeout { .. }
        ));
        drop(held);
    }

    #[test]
    fn reader_blocks_foreign_writer_but_not_reader() {
        let mgr = impatient();
        let read = mgr.acquire(LockMode::ReadOnly).unwrap();

        let mgr2 = mgr.clone();
        let reader = thread::spawn(move || mgr2.acquire(LockMode::ReadOnly).map(|_| ()));
        reader.join().unwrap().unwrap();

        let mgr3 = mgr.clone();
        let writer = thread::spawn(move || mgr3.acquire(LockMode::ReadWrite).map(|_| ()));
        assert!(writer.join().unwrap().is_err());
        drop(read);
    }

    #[test]
    fn release_wakes_waiter() {
        let mgr = manager();
        let held = mgr.acquire(LockMode::ReadWrite).unwrap();

        let (tx, rx) = mpsc::channel();
        let mgr2 = mgr.clone();
        let waiter = thread::spawn(move || {
            tx.send(()).unwrap();
            mgr2.acquire(LockMode::ReadWrite).map(|lock| lock.mode())
        });

        rx.recv().unwrap();
        // Give the waiter time to park on the queue.
        thread::sleep(Duration::from_millis(20));
        drop(held);

        assert_eq!(waiter.join().unwrap().unwrap(), LockMode::ReadWrite);
    }

    #[test]
    fn simulated_foreign_process_is_excluded() {
        let mgr = impatient();
        let local = LockOwner::current();
        let foreign = LockOwner {
            process: local.process.wrapping_add(1),
            thread: local.thread,
        };

        let held = mgr.acquire_as(foreign, LockMode::ReadWrite).unwrap();
        assert!(matches!(
            mgr.acquire(LockMode::ReadOnly).unwrap_err(),
            LockError::Timeout { .. }
        ));
        drop(held);
        mgr.acquire(LockMode::ReadOnly).unwrap();
    }

    // -----------------------------------------------------------------------
    // Close / orphaning
    // -----------------------------------------------------------------------

    #[test]
    fn close_orphans_outstanding_tokens() {
        let mgr = manager();
        let token = mgr.acquire(LockMode::ReadWrite).unwrap();
        mgr.close();
        assert_eq!(mgr.lock_count(), 0);
        // Release of an orphaned token must be a silent no-op.
        drop(token);
    }

    #[test]
    fn acquire_after_close_fails() {
        let mgr = manager();
        mgr.close();
        assert!(matches!(
            mgr.acquire(LockMode::ReadOnly).unwrap_err(),
            LockError::Closed
        ));
    }

    #[test]
    fn close_fails_queued_waiters() {
        let mgr = manager();
        let held = mgr.acquire(LockMode::ReadWrite).unwrap();

        let (tx, rx) = mpsc::channel();
        let mgr2 = mgr.clone();
        let waiter = thread::spawn(move || {
            tx.send(()).unwrap();
            mgr2.acquire(LockMode::ReadWrite).map(|_| ())
        });
        rx.recv().unwrap();
        thread::sleep(Duration::from_millis(20));

        mgr.close();
        assert!(matches!(
            waiter.join().unwrap().unwrap_err(),
            LockError::Closed
        ));
        drop(held);
    }

    // -----------------------------------------------------------------------
    // Recycling suspension signal
    // -----------------------------------------------------------------------

    #[test]
    fn lock_count_tracks_claims() {
        let mgr = manager();
        assert_eq!(mgr.lock_count(), 0);
        let a = mgr.acquire(LockMode::ReadOnly).unwrap();
        assert_eq!(mgr.lock_count(), 1);
        a.release();
        assert_eq!(mgr.lock_count(), 0);
    }

    #[test]
    fn write_locked_flag() {
        let mgr = manager();
        assert!(!mgr.write_locked());
        let w = mgr.acquire(LockMode::ReadWrite).unwrap();
        assert!(mgr.write_locked());
        drop(w);
        assert!(!mgr.write_locked());
    }
}
