use serde::{Deserialize, Serialize};

/// Reference-count-driven lifecycle state shared by persistent objects and
/// database addresses.
///
/// Transitions:
///
/// ```text
/// New --(first add_reference)--> Managed
/// Managed --(count reaches 0)--> Old
/// Old --(add_reference)--> Managed
/// ```
///
/// `New` is never re-entered. Only `Old` entries are eligible for recycling
/// by their owning registry or database.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lifecycle {
    /// Just constructed, never referenced.
    New,
    /// Referenced at least once since construction or since last `Old`.
    Managed,
    /// Reference count dropped back to zero after having been `Managed`.
    Old,
}

impl Lifecycle {
    /// State after a reference is acquired (count 0 → 1).
    ///
    /// `New` and `Old` both become `Managed`; acquiring on an already
    /// `Managed` entry leaves the state unchanged.
    pub fn on_acquire(self) -> Self {
        Lifecycle::Managed
    }

    /// State after the last reference is released (count 1 → 0).
    ///
    /// # Panics
    ///
    /// Panics if called on `New` or `Old`: releasing an unreferenced entry
    /// is a programmer error, not a recoverable condition.
    pub fn on_release(self) -> Self {
        match self {
            Lifecycle::Managed => Lifecycle::Old,
            other => panic!("release on unreferenced {other:?} entry"),
        }
    }

    /// Returns `true` if the entry is eligible for recycling.
    pub fn is_recyclable(self) -> bool {
        self == Lifecycle::Old
    }
}
