//! Concrete domain objects of the time-tracking store.
//!
//! Each type implements [`Persistent`](crate::traits::Persistent) and is
//! wrapped by [`DomainObject`](crate::domain::DomainObject) for storage in
//! the database's slot arena.

mod account;
mod activity;
mod schedule;
mod user;

pub use account::{Account, Project};
pub use activity::{Activity, ActivityCore, ActivityLike, ActivityType, Task};
pub use schedule::{Event, WorkUnit, Workload};
pub use user::User;
