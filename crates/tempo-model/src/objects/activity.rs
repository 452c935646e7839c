use chrono::{DateTime, Utc};
use tempo_types::Oid;

use crate::error::{ModelError, ModelResult};
use crate::kind::ObjectKind;
use crate::record::{MultiRef, ObjectRecord, PropertyMap, PropertyValue, SingleRef};
use crate::traits::Persistent;

/// A category of trackable work (e.g. "development", "support"), with a
/// billing rate.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivityType {
    pub name: String,
    pub hourly_rate: f64,
}

impl ActivityType {
    pub fn new(name: impl Into<String>, hourly_rate: f64) -> Self {
        Self {
            name: name.into(),
            hourly_rate,
        }
    }
}

impl Persistent for ActivityType {
    fn kind(&self) -> ObjectKind {
        ObjectKind::ActivityType
    }

    fn serialize_properties(&self, props: &mut PropertyMap) {
        props.insert("name".into(), PropertyValue::Text(self.name.clone()));
        props.insert("hourly_rate".into(), PropertyValue::Real(self.hourly_rate));
    }

    fn apply_properties(&mut self, record: &ObjectRecord) -> ModelResult<()> {
        self.name = record.require_text("name")?;
        self.hourly_rate = record.require_real("hourly_rate")?;
        Ok(())
    }
}

/// The activity facet shared by plain activities and tasks.
///
/// The source model made a task *be* an activity through inheritance; here
/// task-ness composes an `ActivityCore` and exposes it through
/// [`ActivityLike`] instead.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivityCore {
    pub name: String,
    pub activity_type: Option<Oid>,
    pub workload: Option<Oid>,
}

impl ActivityCore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            activity_type: None,
            workload: None,
        }
    }

    fn serialize_properties(&self, props: &mut PropertyMap) {
        props.insert("name".into(), PropertyValue::Text(self.name.clone()));
    }

    fn apply_properties(&mut self, record: &ObjectRecord) -> ModelResult<()> {
        self.name = record.require_text("name")?;
        Ok(())
    }

    fn association_edges(&self) -> Vec<SingleRef> {
        vec![
            SingleRef {
                edge: "activity_type".into(),
                target: self.activity_type,
            },
            SingleRef {
                edge: "workload".into(),
                target: self.workload,
            },
        ]
    }

    /// Apply a recognized core edge. Returns `false` if the edge is not a
    /// core edge so the caller can handle its own.
    fn apply_edge(&mut self, edge: &SingleRef) -> bool {
        match edge.edge.as_str() {
            "activity_type" => {
                self.activity_type = edge.target;
                true
            }
            "workload" => {
                self.workload = edge.target;
                true
            }
            _ => false,
        }
    }

    fn clear_reference(&mut self, target: Oid) {
        if self.activity_type == Some(target) {
            self.activity_type = None;
        }
        if self.workload == Some(target) {
            self.workload = None;
        }
    }
}

/// Capability trait for anything that carries an activity facet.
pub trait ActivityLike {
    fn activity(&self) -> &ActivityCore;
    fn activity_mut(&mut self) -> &mut ActivityCore;

    fn activity_name(&self) -> &str {
        &self.activity().name
    }

    fn activity_type(&self) -> Option<Oid> {
        self.activity().activity_type
    }

    fn workload(&self) -> Option<Oid> {
        self.activity().workload
    }
}

/// A plain trackable activity.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Activity {
    pub core: ActivityCore,
}

impl Activity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: ActivityCore::new(name),
        }
    }
}

impl ActivityLike for Activity {
    fn activity(&self) -> &ActivityCore {
        &self.core
    }

    fn activity_mut(&mut self) -> &mut ActivityCore {
        &mut self.core
    }
}

impl Persistent for Activity {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Activity
    }

    fn serialize_properties(&self, props: &mut PropertyMap) {
        self.core.serialize_properties(props);
    }

    fn apply_properties(&mut self, record: &ObjectRecord) -> ModelResult<()> {
        self.core.apply_properties(record)
    }

    fn association_edges(&self) -> (Vec<SingleRef>, Vec<MultiRef>) {
        (self.core.association_edges(), Vec::new())
    }

    fn set_association_edges(
        &mut self,
        single: &[SingleRef],
        _multi: &[MultiRef],
    ) -> ModelResult<()> {
        self.core.activity_type = None;
        self.core.workload = None;
        for edge in single {
            if !self.core.apply_edge(edge) {
                return Err(ModelError::UnknownEdge {
                    kind: self.kind(),
                    edge: edge.edge.clone(),
                });
            }
        }
        Ok(())
    }

    fn clear_reference(&mut self, target: Oid) {
        self.core.clear_reference(target);
    }
}

/// A task: an activity with scheduling state, aggregated under a project.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Task {
    pub core: ActivityCore,
    pub due: Option<DateTime<Utc>>,
    pub done: bool,
    pub assignee: Option<Oid>,
    pub project: Option<Oid>,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            core: ActivityCore::new(name),
            due: None,
            done: false,
            assignee: None,
            project: None,
        }
    }
}

impl ActivityLike for Task {
    fn activity(&self) -> &ActivityCore {
        &self.core
    }

    fn activity_mut(&mut self) -> &mut ActivityCore {
        &mut self.core
    }
}

impl Persistent for Task {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Task
    }

    fn serialize_properties(&self, props: &mut PropertyMap) {
        self.core.serialize_properties(props);
        let due = match self.due {
            Some(t) => PropertyValue::Timestamp(t),
            None => PropertyValue::Null,
        };
        props.insert("due".into(), due);
        props.insert("done".into(), PropertyValue::Bool(self.done));
    }

    fn apply_properties(&mut self, record: &ObjectRecord) -> ModelResult<()> {
        self.core.apply_properties(record)?;
        self.due = record.optional_timestamp("due")?;
        self.done = record.require_bool("done")?;
        Ok(())
    }

    fn parent(&self) -> Option<Oid> {
        self.project
    }

    fn set_parent(&mut self, parent: Option<Oid>) {
        self.project = parent;
    }

    fn association_edges(&self) -> (Vec<SingleRef>, Vec<MultiRef>) {
        let mut single = self.core.association_edges();
        single.push(SingleRef {
            edge: "assignee".into(),
            target: self.assignee,
        });
        (single, Vec::new())
    }

    fn set_association_edges(
        &mut self,
        single: &[SingleRef],
        _multi: &[MultiRef],
    ) -> ModelResult<()> {
        self.core.activity_type = None;
        self.core.workload = None;
        self.assignee = None;
        for edge in single {
            if self.core.apply_edge(edge) {
                continue;
            }
            match edge.edge.as_str() {
                "assignee" => self.assignee = edge.target,
                other => {
                    return Err(ModelError::UnknownEdge {
                        kind: self.kind(),
                        edge: other.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    fn clear_reference(&mut self, target: Oid) {
        self.core.clear_reference(target);
        if self.assignee == Some(target) {
            self.assignee = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn activity_type_record_roundtrip() {
        let mut at = ActivityType::new("development", 85.0);
        let record = at.serialize(Oid::random());
        let mut restored = ActivityType::default();
        restored.deserialize_into(&record).unwrap();
        assert_eq!(restored, at);
    }

    #[test]
    fn activity_record_roundtrip() {
        let mut activity = Activity::new("code review");
        activity.core.activity_type = Some(Oid::random());
        activity.core.workload = Some(Oid::random());

        let record = activity.serialize(Oid::random());
        let mut restored = Activity::default();
        restored.deserialize_into(&record).unwrap();
        assert_eq!(restored, activity);
    }

    #[test]
    fn task_record_roundtrip() {
        let mut task = Task::new("ship release");
        task.due = Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        task.done = true;
        task.assignee = Some(Oid::random());
        task.project = Some(Oid::random());
        task.core.activity_type = Some(Oid::random());

        let record = task.serialize(Oid::random());
        assert_eq!(record.parent, task.project);

        let mut restored = Task::default();
        restored.deserialize_into(&record).unwrap();
        assert_eq!(restored, task);
    }

    #[test]
    fn task_without_due_date_roundtrips_as_null() {
        let mut task = Task::new("open ended");
        let record = task.serialize(Oid::random());
        assert_eq!(record.properties.get("due"), Some(&PropertyValue::Null));

        let mut restored = Task::default();
        restored.deserialize_into(&record).unwrap();
        assert_eq!(restored.due, None);
    }

    #[test]
    fn task_exposes_activity_facet() {
        let mut task = Task::new("ship release");
        let at = Oid::random();
        task.activity_mut().activity_type = Some(at);
        assert_eq!(task.activity_name(), "ship release");
        assert_eq!(task.activity_type(), Some(at));
    }

    #[test]
    fn clear_reference_covers_core_and_assignee() {
        let target = Oid::random();
        let mut task = Task::new("t");
        task.core.activity_type = Some(target);
        task.assignee = Some(target);
        task.clear_reference(target);
        assert_eq!(task.core.activity_type, None);
        assert_eq!(task.assignee, None);
    }

    #[test]
    fn record_kind_mismatch_is_rejected() {
        let mut activity = Activity::new("a");
        let record = activity.serialize(Oid::random());
        let mut task = Task::default();
        let err = task.deserialize_into(&record).unwrap_err();
        assert!(matches!(err, ModelError::KindMismatch { .. }));
    }
}
