use tempo_types::{Oid, Principal};

use crate::error::ModelResult;
use crate::kind::ObjectKind;
use crate::objects::{
    Account, Activity, ActivityType, Event, Project, Task, User, WorkUnit, Workload,
};
use crate::record::{ChildSet, MultiRef, ObjectRecord, PropertyMap, SingleRef};
use crate::traits::{GraphView, Persistent, ValidationIssue};

/// Tagged union over every concrete persistent-object type.
///
/// Objects are stored in the database's slot arena as `DomainObject` values;
/// all [`Persistent`] hooks dispatch to the wrapped variant.
#[derive(Clone, Debug, PartialEq)]
pub enum DomainObject {
    User(User),
    Account(Account),
    Project(Project),
    ActivityType(ActivityType),
    Activity(Activity),
    Task(Task),
    WorkUnit(WorkUnit),
    Event(Event),
    Workload(Workload),
}

macro_rules! dispatch {
    ($self:expr, $inner:ident => $body:expr) => {
        match $self {
            DomainObject::User($inner) => $body,
            DomainObject::Account($inner) => $body,
            DomainObject::Project($inner) => $body,
            DomainObject::ActivityType($inner) => $body,
            DomainObject::Activity($inner) => $body,
            DomainObject::Task($inner) => $body,
            DomainObject::WorkUnit($inner) => $body,
            DomainObject::Event($inner) => $body,
            DomainObject::Workload($inner) => $body,
        }
    };
}

impl DomainObject {
    /// A default-initialized object of the given kind, ready for
    /// `deserialize_into`.
    pub fn new_for_kind(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::User => DomainObject::User(User::default()),
            ObjectKind::Account => DomainObject::Account(Account::default()),
            ObjectKind::Project => DomainObject::Project(Project::default()),
            ObjectKind::ActivityType => DomainObject::ActivityType(ActivityType::default()),
            ObjectKind::Activity => DomainObject::Activity(Activity::default()),
            ObjectKind::Task => DomainObject::Task(Task::default()),
            ObjectKind::WorkUnit => DomainObject::WorkUnit(WorkUnit::default()),
            ObjectKind::Event => DomainObject::Event(Event::default()),
            ObjectKind::Workload => DomainObject::Workload(Workload::default()),
        }
    }

    /// Reconstruct an object from its encoded record.
    pub fn from_record(record: &ObjectRecord) -> ModelResult<Self> {
        let mut object = Self::new_for_kind(record.kind);
        object.deserialize_into(record)?;
        Ok(object)
    }

    /// The uniqueness-scoped display name of this object, if its kind
    /// participates in a name-uniqueness scope.
    pub fn scoped_name(&self) -> Option<&str> {
        match self {
            DomainObject::User(u) => Some(&u.name),
            DomainObject::Account(a) => Some(&a.name),
            DomainObject::Project(p) => Some(&p.name),
            DomainObject::Task(t) => Some(&t.core.name),
            _ => None,
        }
    }
}

impl Persistent for DomainObject {
    fn kind(&self) -> ObjectKind {
        dispatch!(self, o => o.kind())
    }

    fn load_cached_properties(&mut self) {
        dispatch!(self, o => o.load_cached_properties())
    }

    fn serialize_properties(&self, props: &mut PropertyMap) {
        dispatch!(self, o => o.serialize_properties(props))
    }

    fn apply_properties(&mut self, record: &ObjectRecord) -> ModelResult<()> {
        dispatch!(self, o => o.apply_properties(record))
    }

    fn parent(&self) -> Option<Oid> {
        dispatch!(self, o => o.parent())
    }

    fn set_parent(&mut self, parent: Option<Oid>) {
        dispatch!(self, o => o.set_parent(parent))
    }

    fn aggregation_edges(&self) -> Vec<ChildSet> {
        dispatch!(self, o => o.aggregation_edges())
    }

    fn set_aggregation_edges(&mut self, edges: &[ChildSet]) -> ModelResult<()> {
        dispatch!(self, o => o.set_aggregation_edges(edges))
    }

    fn association_edges(&self) -> (Vec<SingleRef>, Vec<MultiRef>) {
        dispatch!(self, o => o.association_edges())
    }

    fn set_association_edges(&mut self, single: &[SingleRef], multi: &[MultiRef]) -> ModelResult<()> {
        dispatch!(self, o => o.set_association_edges(single, multi))
    }

    fn validate(&self, oid: Oid, graph: &dyn GraphView, issues: &mut Vec<ValidationIssue>) {
        dispatch!(self, o => o.validate(oid, graph, issues))
    }

    fn clear_reference(&mut self, target: Oid) {
        dispatch!(self, o => o.clear_reference(target))
    }

    fn can_read(&self, principal: &Principal) -> bool {
        dispatch!(self, o => o.can_read(principal))
    }

    fn can_modify(&self, principal: &Principal) -> bool {
        dispatch!(self, o => o.can_modify(principal))
    }

    fn can_destroy(&self, principal: &Principal) -> bool {
        dispatch!(self, o => o.can_destroy(principal))
    }
}

impl From<User> for DomainObject {
    fn from(v: User) -> Self {
        DomainObject::User(v)
    }
}

impl From<Account> for DomainObject {
    fn from(v: Account) -> Self {
        DomainObject::Account(v)
    }
}

impl From<Project> for DomainObject {
    fn from(v: Project) -> Self {
        DomainObject::Project(v)
    }
}

impl From<ActivityType> for DomainObject {
    fn from(v: ActivityType) -> Self {
        DomainObject::ActivityType(v)
    }
}

impl From<Activity> for DomainObject {
    fn from(v: Activity) -> Self {
        DomainObject::Activity(v)
    }
}

impl From<Task> for DomainObject {
    fn from(v: Task) -> Self {
        DomainObject::Task(v)
    }
}

impl From<WorkUnit> for DomainObject {
    fn from(v: WorkUnit) -> Self {
        DomainObject::WorkUnit(v)
    }
}

impl From<Event> for DomainObject {
    fn from(v: Event) -> Self {
        DomainObject::Event(v)
    }
}

impl From<Workload> for DomainObject {
    fn from(v: Workload) -> Self {
        DomainObject::Workload(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_for_kind_matches_kind() {
        for kind in crate::kind::ALL_KINDS {
            assert_eq!(DomainObject::new_for_kind(kind).kind(), kind);
        }
    }

    #[test]
    fn from_record_reconstructs_every_kind() {
        for kind in crate::kind::ALL_KINDS {
            let mut original = DomainObject::new_for_kind(kind);
            let record = original.serialize(Oid::random());
            let restored = DomainObject::from_record(&record).unwrap();
            assert_eq!(restored, original, "roundtrip failed for {kind}");
        }
    }

    #[test]
    fn scoped_names() {
        let user = DomainObject::from(User::new("ada", "ada@example.org"));
        assert_eq!(user.scoped_name(), Some("ada"));

        let event = DomainObject::new_for_kind(ObjectKind::Event);
        assert_eq!(event.scoped_name(), None);
    }

    #[test]
    fn capability_hooks_dispatch() {
        let user = DomainObject::from(User::new("ada", "ada@example.org"));
        assert!(!user.can_destroy(&Principal::anonymous()));

        let activity = DomainObject::new_for_kind(ObjectKind::Activity);
        assert!(activity.can_destroy(&Principal::anonymous()));
    }
}
