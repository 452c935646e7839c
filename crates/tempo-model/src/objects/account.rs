use tempo_types::Oid;

use crate::error::{ModelError, ModelResult};
use crate::kind::ObjectKind;
use crate::record::{ChildSet, MultiRef, ObjectRecord, PropertyMap, PropertyValue, SingleRef};
use crate::traits::Persistent;

/// A billing account. Aggregates projects and references its owning user.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Account {
    pub name: String,
    pub owner: Option<Oid>,
    pub projects: Vec<Oid>,
}

impl Account {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: None,
            projects: Vec::new(),
        }
    }
}

impl Persistent for Account {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Account
    }

    fn serialize_properties(&self, props: &mut PropertyMap) {
        props.insert("name".into(), PropertyValue::Text(self.name.clone()));
    }

    fn apply_properties(&mut self, record: &ObjectRecord) -> ModelResult<()> {
        self.name = record.require_text("name")?;
        Ok(())
    }

    fn aggregation_edges(&self) -> Vec<ChildSet> {
        vec![ChildSet {
            edge: "projects".into(),
            children: self.projects.clone(),
        }]
    }

    fn set_aggregation_edges(&mut self, edges: &[ChildSet]) -> ModelResult<()> {
        self.projects.clear();
        for edge in edges {
            match edge.edge.as_str() {
                "projects" => self.projects = edge.children.clone(),
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
                edge: "owner".into(),
                target: self.owner,
            }],
            Vec::new(),
        )
    }

    fn set_association_edges(
        &mut self,
        single: &[SingleRef],
        _multi: &[MultiRef],
    ) -> ModelResult<()> {
        self.owner = None;
        for edge in single {
            match edge.edge.as_str() {
                "owner" => self.owner = edge.target,
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
        if self.owner == Some(target) {
            self.owner = None;
        }
        self.projects.retain(|&child| child != target);
    }
}

/// A project under an account. Aggregates tasks; its member list is a
/// multi-valued association to users (join table on the relational side).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Project {
    pub name: String,
    pub account: Option<Oid>,
    pub tasks: Vec<Oid>,
    pub members: Vec<Oid>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            account: None,
            tasks: Vec::new(),
            members: Vec::new(),
        }
    }
}

impl Persistent for Project {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Project
    }

    fn serialize_properties(&self, props: &mut PropertyMap) {
        props.insert("name".into(), PropertyValue::Text(self.name.clone()));
    }

    fn apply_properties(&mut self, record: &ObjectRecord) -> ModelResult<()> {
        self.name = record.require_text("name")?;
        Ok(())
    }

    fn parent(&self) -> Option<Oid> {
        self.account
    }

    fn set_parent(&mut self, parent: Option<Oid>) {
        self.account = parent;
    }

    fn aggregation_edges(&self) -> Vec<ChildSet> {
        vec![ChildSet {
            edge: "tasks".into(),
            children: self.tasks.clone(),
        }]
    }

    fn set_aggregation_edges(&mut self, edges: &[ChildSet]) -> ModelResult<()> {
        self.tasks.clear();
        for edge in edges {
            match edge.edge.as_str() {
                "tasks" => self.tasks = edge.children.clone(),
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
            Vec::new(),
            vec![MultiRef {
                edge: "members".into(),
                targets: self.members.clone(),
            }],
        )
    }

    fn set_association_edges(
        &mut self,
        _single: &[SingleRef],
        multi: &[MultiRef],
    ) -> ModelResult<()> {
        self.members.clear();
        for edge in multi {
            match edge.edge.as_str() {
                "members" => self.members = edge.targets.clone(),
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
        self.members.retain(|&member| member != target);
        self.tasks.retain(|&task| task != target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_record_roundtrip() {
        let mut account = Account::new("acme");
        account.owner = Some(Oid::random());
        account.projects = vec![Oid::random(), Oid::random()];

        let record = account.serialize(Oid::random());
        let mut restored = Account::default();
        restored.deserialize_into(&record).unwrap();
        assert_eq!(restored, account);
    }

    #[test]
    fn project_record_roundtrip_keeps_parent_and_members() {
        let mut project = Project::new("relaunch");
        project.account = Some(Oid::random());
        project.tasks = vec![Oid::random()];
        project.members = vec![Oid::random(), Oid::random()];

        let record = project.serialize(Oid::random());
        assert_eq!(record.parent, project.account);

        let mut restored = Project::default();
        restored.deserialize_into(&record).unwrap();
        assert_eq!(restored, project);
    }

    #[test]
    fn unknown_edge_is_rejected() {
        let mut account = Account::default();
        let err = account
            .set_aggregation_edges(&[ChildSet {
                edge: "widgets".into(),
                children: vec![],
            }])
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownEdge { .. }));
    }

    #[test]
    fn clear_reference_nulls_owner() {
        let owner = Oid::random();
        let mut account = Account::new("acme");
        account.owner = Some(owner);
        account.clear_reference(owner);
        assert_eq!(account.owner, None);
    }

    #[test]
    fn clear_reference_removes_member() {
        let member = Oid::random();
        let mut project = Project::new("relaunch");
        project.members = vec![member, Oid::random()];
        project.clear_reference(member);
        assert_eq!(project.members.len(), 1);
        assert!(!project.members.contains(&member));
    }
}
