use std::time::{Duration, Instant};

/// Default validity window for cached values.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

/// A time-boxed cache cell wrapping a loader callback.
///
/// Holds a value plus a validity deadline. Reading past the deadline (or
/// before the first store) forces a synchronous reload through the supplied
/// loader, which must call [`set_value`](CachedValue::set_value) before
/// returning — a loader that does not is a programming error and aborts.
///
/// Not internally synchronized: callers must hold the owning object's
/// database-level lock, matching the rest of the object model's locking
/// discipline.
#[derive(Debug)]
pub struct CachedValue<T> {
    slot: Option<T>,
    deadline: Option<Instant>,
    ttl: Duration,
}

impl<T> CachedValue<T> {
    /// Create an empty cell with the default TTL.
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_CACHE_TTL)
    }

    /// Create an empty cell with an explicit TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            slot: None,
            deadline: None,
            ttl,
        }
    }

    /// Read the cached value, reloading through `loader` if the cell is
    /// empty, invalidated, or past its deadline.
    ///
    /// # Panics
    ///
    /// Panics if the loader returns without having called `set_value`.
    pub fn value_with<F>(&mut self, loader: F) -> &T
    where
        F: FnOnce(&mut Self),
    {
        if !self.is_fresh() {
            loader(self);
            assert!(
                self.is_fresh(),
                "CachedValue loader returned without calling set_value"
            );
        }
        self.slot.as_ref().expect("fresh cell holds a value")
    }

    /// Store a value and stamp the deadline at `now + ttl`.
    pub fn set_value(&mut self, value: T) {
        self.slot = Some(value);
        self.deadline = Some(Instant::now() + self.ttl);
    }

    /// Force the next read to reload regardless of deadline.
    pub fn invalidate(&mut self) {
        self.deadline = None;
    }

    /// Returns `true` if a value is present and its deadline has not passed.
    pub fn is_fresh(&self) -> bool {
        match (&self.slot, self.deadline) {
            (Some(_), Some(deadline)) => Instant::now() < deadline,
            _ => false,
        }
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Change the TTL for subsequent stores. Does not touch the current
    /// deadline.
    pub fn set_ttl(&mut self, ttl: Duration) {
        self.ttl = ttl;
    }
}

impl<T> Default for CachedValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for CachedValue<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
            deadline: self.deadline,
            ttl: self.ttl,
        }
    }
}
