use serde::{Deserialize, Serialize};

use crate::oid::Oid;

/// Caller identity handed to the object model's access-control hooks.
///
/// The business-rule layer above the store constructs principals; the store
/// only threads them through to `can_read`/`can_modify`/`can_destroy`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Oid of the user acting, if any.
    pub user: Option<Oid>,
    /// Administrative principals pass every capability check.
    pub admin: bool,
}

impl Principal {
    /// A principal acting as the given user.
    pub fn user(oid: Oid) -> Self {
        Self {
            user: Some(oid),
            admin: false,
        }
    }

    /// An administrative principal.
    pub fn admin() -> Self {
        Self {
            user: None,
            admin: true,
        }
    }

    /// An anonymous, unprivileged principal.
    pub fn anonymous() -> Self {
        Self {
            user: None,
            admin: false,
        }
    }
}
