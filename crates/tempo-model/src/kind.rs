use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::record::PropertyKind;

/// Declared scalar property of a kind.
///
/// Both serializer backends consult this table: the relational layout maps
/// each entry to a column, the tree layout to an attribute. Optional
/// properties may be absent in storage and decode to `PropertyValue::Null`.
pub struct PropertySpec {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub required: bool,
}

const fn prop(name: &'static str, kind: PropertyKind) -> PropertySpec {
    PropertySpec {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: PropertyKind) -> PropertySpec {
    PropertySpec {
        name,
        kind,
        required: false,
    }
}

/// Discriminator for every concrete persistent-object type.
///
/// The tag (`as_tag`) is the canonical type discriminator used by both
/// serializers: the tree backend uses it as the element name, the relational
/// backend derives table names from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    User,
    Account,
    Project,
    ActivityType,
    Activity,
    Task,
    WorkUnit,
    Event,
    Workload,
}

/// Every kind, in a stable order (parents before their aggregated children,
/// association targets before referrers where possible).
pub const ALL_KINDS: [ObjectKind; 9] = [
    ObjectKind::User,
    ObjectKind::ActivityType,
    ObjectKind::Account,
    ObjectKind::Project,
    ObjectKind::Workload,
    ObjectKind::Activity,
    ObjectKind::Task,
    ObjectKind::WorkUnit,
    ObjectKind::Event,
];

impl ObjectKind {
    /// Canonical type tag.
    pub fn as_tag(&self) -> &'static str {
        match self {
            ObjectKind::User => "user",
            ObjectKind::Account => "account",
            ObjectKind::Project => "project",
            ObjectKind::ActivityType => "activity_type",
            ObjectKind::Activity => "activity",
            ObjectKind::Task => "task",
            ObjectKind::WorkUnit => "work_unit",
            ObjectKind::Event => "event",
            ObjectKind::Workload => "workload",
        }
    }

    /// Parse a canonical type tag.
    pub fn parse_tag(tag: &str) -> Result<Self, ModelError> {
        match tag {
            "user" => Ok(ObjectKind::User),
            "account" => Ok(ObjectKind::Account),
            "project" => Ok(ObjectKind::Project),
            "activity_type" => Ok(ObjectKind::ActivityType),
            "activity" => Ok(ObjectKind::Activity),
            "task" => Ok(ObjectKind::Task),
            "work_unit" => Ok(ObjectKind::WorkUnit),
            "event" => Ok(ObjectKind::Event),
            "workload" => Ok(ObjectKind::Workload),
            other => Err(ModelError::UnknownKind(other.to_string())),
        }
    }

    /// Relational table name for this kind.
    pub fn table_name(&self) -> String {
        format!("{}s", self.as_tag())
    }

    /// The kind of this kind's aggregation parent, if it is a child kind.
    ///
    /// Root kinds (those held directly in the database's root collections)
    /// return `None`.
    pub fn parent_kind(&self) -> Option<ObjectKind> {
        match self {
            ObjectKind::Project => Some(ObjectKind::Account),
            ObjectKind::Task => Some(ObjectKind::Project),
            ObjectKind::WorkUnit => Some(ObjectKind::Workload),
            _ => None,
        }
    }

    /// Returns `true` if objects of this kind live in a root collection.
    pub fn is_root(&self) -> bool {
        self.parent_kind().is_none()
    }

    /// Declared scalar properties of this kind, in declaration order.
    pub fn properties(&self) -> &'static [PropertySpec] {
        use PropertyKind::*;
        const USER: &[PropertySpec] =
            &[prop("name", Text), prop("email", Text), prop("active", Bool)];
        const ACCOUNT: &[PropertySpec] = &[prop("name", Text)];
        const PROJECT: &[PropertySpec] = &[prop("name", Text)];
        const ACTIVITY_TYPE: &[PropertySpec] = &[prop("name", Text), prop("hourly_rate", Real)];
        const ACTIVITY: &[PropertySpec] = &[prop("name", Text)];
        const TASK: &[PropertySpec] = &[
            prop("name", Text),
            optional("due", Timestamp),
            prop("done", Bool),
        ];
        const WORK_UNIT: &[PropertySpec] = &[
            prop("start", Timestamp),
            prop("end", Timestamp),
            prop("note", Text),
        ];
        const EVENT: &[PropertySpec] = &[
            prop("title", Text),
            prop("start", Timestamp),
            prop("end", Timestamp),
        ];
        const WORKLOAD: &[PropertySpec] = &[
            prop("period_start", Timestamp),
            prop("period_end", Timestamp),
        ];
        match self {
            ObjectKind::User => USER,
            ObjectKind::Account => ACCOUNT,
            ObjectKind::Project => PROJECT,
            ObjectKind::ActivityType => ACTIVITY_TYPE,
            ObjectKind::Activity => ACTIVITY,
            ObjectKind::Task => TASK,
            ObjectKind::WorkUnit => WORK_UNIT,
            ObjectKind::Event => EVENT,
            ObjectKind::Workload => WORKLOAD,
        }
    }

    /// Aggregation edges owned by this kind: `(edge name, child kind)`.
    pub fn aggregations(&self) -> &'static [(&'static str, ObjectKind)] {
        match self {
            ObjectKind::Account => &[("projects", ObjectKind::Project)],
            ObjectKind::Project => &[("tasks", ObjectKind::Task)],
            ObjectKind::Workload => &[("work_units", ObjectKind::WorkUnit)],
            _ => &[],
        }
    }

    /// Single-valued association edges: `(edge name, target kind)`.
    pub fn references(&self) -> &'static [(&'static str, ObjectKind)] {
        match self {
            ObjectKind::Account => &[("owner", ObjectKind::User)],
            ObjectKind::Activity => &[
                ("activity_type", ObjectKind::ActivityType),
                ("workload", ObjectKind::Workload),
            ],
            ObjectKind::Task => &[
                ("activity_type", ObjectKind::ActivityType),
                ("workload", ObjectKind::Workload),
                ("assignee", ObjectKind::User),
            ],
            ObjectKind::WorkUnit => &[("activity", ObjectKind::Activity)],
            ObjectKind::Event => &[("user", ObjectKind::User)],
            ObjectKind::Workload => &[("user", ObjectKind::User)],
            _ => &[],
        }
    }

    /// Multi-valued association edges: `(edge name, target kind)`.
    pub fn reference_lists(&self) -> &'static [(&'static str, ObjectKind)] {
        match self {
            ObjectKind::Project => &[("members", ObjectKind::User)],
            _ => &[],
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}
