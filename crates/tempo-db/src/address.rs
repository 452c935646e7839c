use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tempo_types::Lifecycle;
use tracing::debug;

use crate::error::DbResult;

struct AddressState {
    location: PathBuf,
    lifecycle: Lifecycle,
    ref_count: u32,
}

/// A reference-counted handle to one database storage location.
///
/// Handles follow the shared New/Managed/Old lifecycle: the first
/// `add_reference` makes the address Managed, dropping the count back to
/// zero makes it Old (eligible for the registry's sweep), and re-acquiring
/// returns it to Managed. Once Managed, equality is handle identity — the
/// registry guarantees at most one handle per physical location.
#[derive(Clone)]
pub struct AddressHandle {
    state: Arc<Mutex<AddressState>>,
}

impl AddressHandle {
    fn new(location: PathBuf) -> Self {
        Self {
            state: Arc::new(Mutex::new(AddressState {
                location,
                lifecycle: Lifecycle::New,
                ref_count: 0,
            })),
        }
    }

    /// The canonical storage location this address denotes.
    pub fn location(&self) -> PathBuf {
        self.state.lock().expect("address poisoned").location.clone()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.state.lock().expect("address poisoned").lifecycle
    }

    pub fn ref_count(&self) -> u32 {
        self.state.lock().expect("address poisoned").ref_count
    }

    /// Acquire a reference; New and Old addresses become Managed.
    pub fn add_reference(&self) {
        let mut state = self.state.lock().expect("address poisoned");
        state.ref_count += 1;
        if state.ref_count == 1 {
            state.lifecycle = state.lifecycle.on_acquire();
        }
    }

    /// Release a reference; the last release makes the address Old.
    ///
    /// # Panics
    ///
    /// Panics on an unbalanced release — releasing an address nobody holds
    /// is a programmer error.
    pub fn remove_reference(&self) {
        let mut state = self.state.lock().expect("address poisoned");
        assert!(
            state.ref_count > 0,
            "remove_reference on address {:?} with zero references",
            state.location
        );
        state.ref_count -= 1;
        if state.ref_count == 0 {
            state.lifecycle = state.lifecycle.on_release();
        }
    }

    /// Identity comparison: two handles are the same address only if they
    /// are the same registry entry.
    pub fn same_address(&self, other: &AddressHandle) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}

impl std::fmt::Debug for AddressHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock().expect("address poisoned");
        f.debug_struct("AddressHandle")
            .field("location", &state.location)
            .field("lifecycle", &state.lifecycle)
            .field("ref_count", &state.ref_count)
            .finish()
    }
}

/// Process-wide registry of database addresses, keyed by canonical absolute
/// path.
///
/// Explicitly constructed at startup and passed by reference — never a
/// global. The per-location keying is what enforces the invariant that no
/// two Managed addresses denote the same physical location.
pub struct AddressRegistry {
    entries: Mutex<HashMap<PathBuf, AddressHandle>>,
}

impl AddressRegistry {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The (single) handle for `path`, creating a New entry if absent.
    pub fn address_of(&self, path: &Path) -> DbResult<AddressHandle> {
        let canonical = std::path::absolute(path)?;
        let mut entries = self.entries.lock().expect("registry poisoned");
        let handle = entries
            .entry(canonical.clone())
            .or_insert_with(|| {
                debug!(path = %canonical.display(), "new database address");
                AddressHandle::new(canonical)
            })
            .clone();
        Ok(handle)
    }

    /// Recycle Old entries. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.lock().expect("registry poisoned");
        let before = entries.len();
        entries.retain(|_, handle| handle.lifecycle() != Lifecycle::Old);
        before - entries.len()
    }

    /// Number of registered addresses.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AddressRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_path_yields_same_handle() {
        let registry = AddressRegistry::new();
        let a = registry.address_of(Path::new("/data/tracker.tempo")).unwrap();
        let b = registry.address_of(Path::new("/data/tracker.tempo")).unwrap();
        assert!(a.same_address(&b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn different_paths_yield_different_handles() {
        let registry = AddressRegistry::new();
        let a = registry.address_of(Path::new("/data/a.tempo")).unwrap();
        let b = registry.address_of(Path::new("/data/b.tempo")).unwrap();
        assert!(!a.same_address(&b));
    }

    #[test]
    fn relative_and_absolute_paths_unify() {
        let registry = AddressRegistry::new();
        let cwd = std::env::current_dir().unwrap();
        let a = registry.address_of(Path::new("tracker.tempo")).unwrap();
        let b = registry.address_of(&cwd.join("tracker.tempo")).unwrap();
        assert!(a.same_address(&b));
    }

    #[test]
    fn lifecycle_transitions() {
        let registry = AddressRegistry::new();
        let addr = registry.address_of(Path::new("/data/x.tempo")).unwrap();
        assert_eq!(addr.lifecycle(), Lifecycle::New);

        addr.add_reference();
        assert_eq!(addr.lifecycle(), Lifecycle::Managed);
        addr.add_reference();
        assert_eq!(addr.ref_count(), 2);

        addr.remove_reference();
        assert_eq!(addr.lifecycle(), Lifecycle::Managed);
        addr.remove_reference();
        assert_eq!(addr.lifecycle(), Lifecycle::Old);

        // Re-acquiring revives the entry.
        addr.add_reference();
        assert_eq!(addr.lifecycle(), Lifecycle::Managed);
    }

    #[test]
    #[should_panic(expected = "zero references")]
    fn unbalanced_release_panics() {
        let registry = AddressRegistry::new();
        let addr = registry.address_of(Path::new("/data/x.tempo")).unwrap();
        addr.remove_reference();
    }

    #[test]
    fn sweep_removes_only_old_entries() {
        let registry = AddressRegistry::new();
        let kept = registry.address_of(Path::new("/data/kept.tempo")).unwrap();
        kept.add_reference();

        let dropped = registry.address_of(Path::new("/data/dropped.tempo")).unwrap();
        dropped.add_reference();
        dropped.remove_reference();

        // New entries (never referenced) are not swept either.
        registry.address_of(Path::new("/data/new.tempo")).unwrap();

        assert_eq!(registry.sweep(), 1);
        assert_eq!(registry.len(), 2);
        kept.remove_reference();
    }

    #[test]
    fn swept_location_gets_a_fresh_handle() {
        let registry = AddressRegistry::new();
        let old = registry.address_of(Path::new("/data/x.tempo")).unwrap();
        old.add_reference();
        old.remove_reference();
        registry.sweep();

        let fresh = registry.address_of(Path::new("/data/x.tempo")).unwrap();
        assert!(!fresh.same_address(&old));
        assert_eq!(fresh.lifecycle(), Lifecycle::New);
    }
}
