use chrono::{DateTime, Utc};
use tempo_types::{CachedValue, Oid};

use crate::error::{ModelError, ModelResult};
use crate::kind::ObjectKind;
use crate::record::{ChildSet, MultiRef, ObjectRecord, PropertyMap, PropertyValue, SingleRef};
use crate::traits::{GraphView, Persistent, ValidationIssue};

/// A user's planned workload for a period. Aggregates the work units booked
/// against it and caches the derived total of worked minutes.
#[derive(Clone, Debug)]
pub struct Workload {
    pub user: Option<Oid>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub work_units: Vec<Oid>,
    /// Derived sum of work-unit durations; not persisted. The loader is
    /// supplied by the database, which holds the lock while reading.
    pub total_minutes: CachedValue<i64>,
}

impl Workload {
    pub fn new(period_start: DateTime<Utc>, period_end: DateTime<Utc>) -> Self {
        Self {
            user: None,
            period_start,
            period_end,
            work_units: Vec::new(),
            total_minutes: CachedValue::new(),
        }
    }
}

impl Default for Workload {
    fn default() -> Self {
        Self::new(DateTime::UNIX_EPOCH, DateTime::UNIX_EPOCH)
    }
}

// The cache cell is derived state and takes no part in object equality.
impl PartialEq for Workload {
    fn eq(&self, other: &Self) -> bool {
        self.user == other.user
            && self.period_start == other.period_start
            && self.period_end == other.period_end
            && self.work_units == other.work_units
    }
}

impl Persistent for Workload {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Workload
    }

    fn load_cached_properties(&mut self) {
        // The total depends on child objects the save pass may be rewriting.
        self.total_minutes.invalidate();
    }

    fn serialize_properties(&self, props: &mut PropertyMap) {
        props.insert(
            "period_start".into(),
            PropertyValue::Timestamp(self.period_start),
        );
        props.insert(
            "period_end".into(),
            PropertyValue::Timestamp(self.period_end),
        );
    }

    fn apply_properties(&mut self, record: &ObjectRecord) -> ModelResult<()> {
        self.period_start = record.require_timestamp("period_start")?;
        self.period_end = record.require_timestamp("period_end")?;
        self.total_minutes.invalidate();
        Ok(())
    }

    fn aggregation_edges(&self) -> Vec<ChildSet> {
        vec![ChildSet {
            edge: "work_units".into(),
            children: self.work_units.clone(),
        }]
    }

    fn set_aggregation_edges(&mut self, edges: &[ChildSet]) -> ModelResult<()> {
        self.work_units.clear();
        for edge in edges {
            match edge.edge.as_str() {
                "work_units" => self.work_units = edge.children.clone(),
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

    fn association_edges(&self) -> (Vec<SingleRef>, Vec<MultiRef>) {
        (
            vec![SingleRef {
                edge: "user".into(),
                target: self.user,
            }],
            Vec::new(),
        )
    }

    fn set_association_edges(
        &mut self,
        single: &[SingleRef],
        _multi: &[MultiRef],
    ) -> ModelResult<()> {
        self.user = None;
        for edge in single {
            match edge.edge.as_str() {
                "user" => self.user = edge.target,
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

    fn validate(&self, oid: Oid, _graph: &dyn GraphView, issues: &mut Vec<ValidationIssue>) {
        if self.period_end < self.period_start {
            issues.push(ValidationIssue::new(
                oid,
                self.kind(),
                "period ends before it starts",
            ));
        }
    }

    fn clear_reference(&mut self, target: Oid) {
        if self.user == Some(target) {
            self.user = None;
        }
        self.work_units.retain(|&unit| unit != target);
        self.total_minutes.invalidate();
    }
}

/// A recorded span of work against an activity, aggregated under a workload.
#[derive(Clone, Debug, PartialEq)]
pub struct WorkUnit {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub note: String,
    pub activity: Option<Oid>,
    pub workload: Option<Oid>,
}

impl WorkUnit {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end,
            note: String::new(),
            activity: None,
            workload: None,
        }
    }

    /// Whole minutes between start and end.
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

impl Default for WorkUnit {
    fn default() -> Self {
        Self::new(DateTime::UNIX_EPOCH, DateTime::UNIX_EPOCH)
    }
}

impl Persistent for WorkUnit {
    fn kind(&self) -> ObjectKind {
        ObjectKind::WorkUnit
    }

    fn serialize_properties(&self, props: &mut PropertyMap) {
        props.insert("start".into(), PropertyValue::Timestamp(self.start));
        props.insert("end".into(), PropertyValue::Timestamp(self.end));
        props.insert("note".into(), PropertyValue::Text(self.note.clone()));
    }

    fn apply_properties(&mut self, record: &ObjectRecord) -> ModelResult<()> {
        self.start = record.require_timestamp("start")?;
        self.end = record.require_timestamp("end")?;
        self.note = record.require_text("note")?;
        Ok(())
    }

    fn parent(&self) -> Option<Oid> {
        self.workload
    }

    fn set_parent(&mut self, parent: Option<Oid>) {
        self.workload = parent;
    }

    fn association_edges(&self) -> (Vec<SingleRef>, Vec<MultiRef>) {
        (
            vec![SingleRef {
                edge: "activity".into(),
                target: self.activity,
            }],
            Vec::new(),
        )
    }

    fn set_association_edges(
        &mut self,
        single: &[SingleRef],
        _multi: &[MultiRef],
    ) -> ModelResult<()> {
        self.activity = None;
        for edge in single {
            match edge.edge.as_str() {
                "activity" => self.activity = edge.target,
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

    fn validate(&self, oid: Oid, _graph: &dyn GraphView, issues: &mut Vec<ValidationIssue>) {
        if self.end < self.start {
            issues.push(ValidationIssue::new(
                oid,
                self.kind(),
                "work unit ends before it starts",
            ));
        }
    }

    fn clear_reference(&mut self, target: Oid) {
        if self.activity == Some(target) {
            self.activity = None;
        }
    }
}

/// A calendar event attached to a user.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub user: Option<Oid>,
}

impl Event {
    pub fn new(title: impl Into<String>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            start,
            end,
            user: None,
        }
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new("", DateTime::UNIX_EPOCH, DateTime::UNIX_EPOCH)
    }
}

impl Persistent for Event {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Event
    }

    fn serialize_properties(&self, props: &mut PropertyMap) {
        props.insert("title".into(), PropertyValue::Text(self.title.clone()));
        props.insert("start".into(), PropertyValue::Timestamp(self.start));
        props.insert("end".into(), PropertyValue::Timestamp(self.end));
    }

    fn apply_properties(&mut self, record: &ObjectRecord) -> ModelResult<()> {
        self.title = record.require_text("title")?;
        self.start = record.require_timestamp("start")?;
        self.end = record.require_timestamp("end")?;
        Ok(())
    }

    fn association_edges(&self) -> (Vec<SingleRef>, Vec<MultiRef>) {
        (
            vec![SingleRef {
                edge: "user".into(),
                target: self.user,
            }],
            Vec::new(),
        )
    }

    fn set_association_edges(
        &mut self,
        single: &[SingleRef],
        _multi: &[MultiRef],
    ) -> ModelResult<()> {
        self.user = None;
        for edge in single {
            match edge.edge.as_str() {
                "user" => self.user = edge.target,
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

    fn validate(&self, oid: Oid, _graph: &dyn GraphView, issues: &mut Vec<ValidationIssue>) {
        if self.end < self.start {
            issues.push(ValidationIssue::new(
                oid,
                self.kind(),
                "event ends before it starts",
            ));
        }
    }

    fn clear_reference(&mut self, target: Oid) {
        if self.user == Some(target) {
            self.user = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    struct EmptyGraph;

    impl GraphView for EmptyGraph {
        fn kind_of(&self, _oid: Oid) -> Option<ObjectKind> {
            None
        }
        fn is_live(&self, _oid: Oid) -> bool {
            false
        }
        fn parent_of(&self, _oid: Oid) -> Option<Oid> {
            None
        }
        fn has_child(&self, _parent: Oid, _edge: &str, _child: Oid) -> bool {
            false
        }
    }

    fn stamp(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, h, 0, 0).unwrap()
    }

    #[test]
    fn workload_record_roundtrip() {
        let mut workload = Workload::new(stamp(8), stamp(16));
        workload.user = Some(Oid::random());
        workload.work_units = vec![Oid::random(), Oid::random()];

        let record = workload.serialize(Oid::random());
        let mut restored = Workload::default();
        restored.deserialize_into(&record).unwrap();
        assert_eq!(restored, workload);
    }

    #[test]
    fn work_unit_record_roundtrip() {
        let mut unit = WorkUnit::new(stamp(9), stamp(11));
        unit.note = "standup & triage".into();
        unit.activity = Some(Oid::random());
        unit.workload = Some(Oid::random());

        let record = unit.serialize(Oid::random());
        assert_eq!(record.parent, unit.workload);

        let mut restored = WorkUnit::default();
        restored.deserialize_into(&record).unwrap();
        assert_eq!(restored, unit);
    }

    #[test]
    fn event_record_roundtrip() {
        let mut event = Event::new("planning", stamp(10), stamp(11));
        event.user = Some(Oid::random());

        let record = event.serialize(Oid::random());
        let mut restored = Event::default();
        restored.deserialize_into(&record).unwrap();
        assert_eq!(restored, event);
    }

    #[test]
    fn work_unit_duration_in_minutes() {
        let unit = WorkUnit::new(stamp(9), stamp(11));
        assert_eq!(unit.duration_minutes(), 120);
    }

    #[test]
    fn inverted_spans_are_flagged() {
        let oid = Oid::random();
        let mut issues = Vec::new();
        WorkUnit::new(stamp(11), stamp(9)).validate(oid, &EmptyGraph, &mut issues);
        Event::new("x", stamp(11), stamp(9)).validate(oid, &EmptyGraph, &mut issues);
        Workload::new(stamp(11), stamp(9)).validate(oid, &EmptyGraph, &mut issues);
        assert_eq!(issues.len(), 3);
    }

    #[test]
    fn well_formed_spans_pass() {
        let mut issues = Vec::new();
        WorkUnit::new(stamp(9), stamp(11)).validate(Oid::random(), &EmptyGraph, &mut issues);
        assert!(issues.is_empty());
    }

    #[test]
    fn clear_reference_detaches_work_unit_from_workload_list() {
        let unit = Oid::random();
        let mut workload = Workload::new(stamp(8), stamp(16));
        workload.work_units = vec![unit];
        workload.clear_reference(unit);
        assert!(workload.work_units.is_empty());
    }
}
