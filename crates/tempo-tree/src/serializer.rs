//! Record ↔ element mapping.
//!
//! One element per object: the element name is the kind tag, identity and
//! scalar properties are attributes, aggregated children are nested
//! elements, and association targets are attribute-encoded oids. Decoding
//! runs in two passes — [`element_to_record`] rebuilds structure (properties,
//! parent, child lists) and leaves every association edge empty;
//! [`resolve_associations`] then parses the association attributes, once the
//! whole document is known.

use tempo_model::{ChildSet, ModelError, MultiRef, ObjectKind, ObjectRecord, PropertyValue, SingleRef};
use tempo_types::Oid;

use crate::element::{Element, OID_ATTR};
use crate::error::{TreeError, TreeResult};

/// Separator between the oids of a multi-valued association attribute.
const LIST_SEPARATOR: char = ' ';

/// Encode a record as an element, without its nested children (the document
/// assembly nests those).
pub fn record_to_element(record: &ObjectRecord) -> TreeResult<Element> {
    let kind = record.kind;
    let mut element = Element::new(kind.as_tag());
    element.set_attr(OID_ATTR, record.oid.to_canonical());

    for spec in kind.properties() {
        match record.properties.get(spec.name) {
            None | Some(PropertyValue::Null) => {
                if spec.required {
                    return Err(ModelError::MissingProperty {
                        kind,
                        name: spec.name.to_string(),
                    }
                    .into());
                }
                // Null has no text form; the attribute is omitted.
            }
            Some(value) => {
                if let Some(text) = value.to_text() {
                    element.set_attr(spec.name, text);
                }
            }
        }
    }
    for (edge, _) in kind.references() {
        if let Some(target) = record.reference(edge) {
            element.set_attr(*edge, target.to_canonical());
        }
    }
    for (edge, _) in kind.reference_lists() {
        let targets = record.reference_list(edge);
        if !targets.is_empty() {
            let joined: Vec<String> = targets.iter().map(Oid::to_canonical).collect();
            element.set_attr(*edge, joined.join(&LIST_SEPARATOR.to_string()));
        }
    }
    Ok(element)
}

/// First decoding pass: structure only.
///
/// `parent` is the identity of the enclosing element (`None` at the document
/// root level). Child lists are read off the nested elements in document
/// order; a nested element whose tag matches no aggregation edge of this
/// kind is rejected. Association edges come back empty.
pub fn element_to_record(element: &Element, parent: Option<Oid>) -> TreeResult<ObjectRecord> {
    let kind = ObjectKind::parse_tag(&element.name).map_err(TreeError::Model)?;
    let oid = Oid::parse(required_attr(element, OID_ATTR)?)?;
    let mut record = ObjectRecord::new(oid, kind);
    record.parent = parent;

    for spec in kind.properties() {
        let value = match element.attr(spec.name) {
            Some(text) => PropertyValue::parse(spec.kind, text)?,
            None if spec.required => {
                return Err(TreeError::MissingAttribute {
                    element: element.name.clone(),
                    attribute: spec.name.to_string(),
                })
            }
            None => PropertyValue::Null,
        };
        record.properties.insert(spec.name.to_string(), value);
    }

    for (edge, _) in kind.aggregations() {
        record.aggregations.push(ChildSet {
            edge: edge.to_string(),
            children: Vec::new(),
        });
    }
    for child in &element.children {
        let child_kind = ObjectKind::parse_tag(&child.name).map_err(|_| {
            TreeError::UnexpectedElement {
                parent: element.name.clone(),
                child: child.name.clone(),
            }
        })?;
        let edge = kind
            .aggregations()
            .iter()
            .find(|(_, k)| *k == child_kind)
            .map(|(edge, _)| *edge)
            .ok_or_else(|| TreeError::UnexpectedElement {
                parent: element.name.clone(),
                child: child.name.clone(),
            })?;
        let child_oid = Oid::parse(required_attr(child, OID_ATTR)?)?;
        let set = record
            .aggregations
            .iter_mut()
            .find(|set| set.edge == edge)
            .expect("declared edges are materialized above");
        set.children.push(child_oid);
    }

    for (edge, _) in kind.references() {
        record.references.push(SingleRef {
            edge: edge.to_string(),
            target: None,
        });
    }
    for (edge, _) in kind.reference_lists() {
        record.reference_lists.push(MultiRef {
            edge: edge.to_string(),
            targets: Vec::new(),
        });
    }
    Ok(record)
}

/// Second decoding pass: parse the association attributes into the record's
/// (already materialized) association edges.
pub fn resolve_associations(record: &mut ObjectRecord, element: &Element) -> TreeResult<()> {
    for reference in &mut record.references {
        if let Some(text) = element.attr(&reference.edge) {
            reference.target = Some(Oid::parse(text)?);
        }
    }
    for list in &mut record.reference_lists {
        if let Some(text) = element.attr(&list.edge) {
            for token in text.split(LIST_SEPARATOR).filter(|t| !t.is_empty()) {
                list.targets.push(Oid::parse(token)?);
            }
        }
    }
    Ok(())
}

/// Both decoding passes over one element, for single-object reads.
pub fn decode_element(element: &Element, parent: Option<Oid>) -> TreeResult<ObjectRecord> {
    let mut record = element_to_record(element, parent)?;
    resolve_associations(&mut record, element)?;
    Ok(record)
}

fn required_attr<'a>(element: &'a Element, attribute: &str) -> TreeResult<&'a str> {
    element
        .attr(attribute)
        .ok_or_else(|| TreeError::MissingAttribute {
            element: element.name.clone(),
            attribute: attribute.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempo_model::{Persistent, Project, Task, User, Workload};

    use super::*;

    fn roundtrip(record: &ObjectRecord) -> ObjectRecord {
        let element = record_to_element(record).unwrap();
        decode_element(&element, record.parent).unwrap()
    }

    #[test]
    fn user_element_roundtrip() {
        let record = User::new("ada", "ada@example.org").serialize(Oid::random());
        let element = record_to_element(&record).unwrap();
        assert_eq!(element.name, "user");
        assert_eq!(element.attr("name"), Some("ada"));
        assert_eq!(roundtrip(&record), record);
    }

    #[test]
    fn task_roundtrip_with_and_without_due_date() {
        let mut task = Task::new("ship");
        task.project = Some(Oid::random());
        task.assignee = Some(Oid::random());
        let record = task.serialize(Oid::random());
        let element = record_to_element(&record).unwrap();
        assert_eq!(element.attr("due"), None);
        assert_eq!(roundtrip(&record), record);

        task.due = Some(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap());
        let record = task.serialize(Oid::random());
        assert_eq!(roundtrip(&record), record);
    }

    #[test]
    fn members_are_one_ordered_attribute() {
        let mut project = Project::new("site");
        project.account = Some(Oid::random());
        let members = vec![Oid::random(), Oid::random()];
        project.members = members.clone();
        let record = project.serialize(Oid::random());

        let element = record_to_element(&record).unwrap();
        let expected = format!(
            "{} {}",
            members[0].to_canonical(),
            members[1].to_canonical()
        );
        assert_eq!(element.attr("members"), Some(expected.as_str()));
        assert_eq!(roundtrip(&record), record);
    }

    #[test]
    fn first_pass_leaves_associations_empty() {
        let user = Oid::random();
        let t0 = Utc.with_ymd_and_hms(2024, 6, 3, 9, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 6, 7, 17, 0, 0).unwrap();
        let mut workload = Workload::new(t0, t1);
        workload.user = Some(user);
        let record = workload.serialize(Oid::random());
        let element = record_to_element(&record).unwrap();

        let structural = element_to_record(&element, None).unwrap();
        assert_eq!(structural.reference("user"), None);

        let mut resolved = structural;
        resolve_associations(&mut resolved, &element).unwrap();
        assert_eq!(resolved.reference("user"), Some(user));
    }

    #[test]
    fn nested_children_fill_the_child_list_in_document_order() {
        let mut account = Element::new("account");
        account.set_attr(OID_ATTR, Oid::random().to_canonical());
        account.set_attr("name", "acme");
        let children: Vec<Oid> = vec![Oid::random(), Oid::random()];
        for &oid in &children {
            let mut project = Element::new("project");
            project.set_attr(OID_ATTR, oid.to_canonical());
            project.set_attr("name", "p");
            account.add_child(project);
        }

        let record = element_to_record(&account, None).unwrap();
        assert_eq!(record.children("projects"), children);
    }

    #[test]
    fn unexpected_nested_element_is_rejected() {
        let mut account = Element::new("account");
        account.set_attr(OID_ATTR, Oid::random().to_canonical());
        account.set_attr("name", "acme");
        let mut task = Element::new("task");
        task.set_attr(OID_ATTR, Oid::random().to_canonical());
        account.add_child(task);

        assert!(matches!(
            element_to_record(&account, None).unwrap_err(),
            TreeError::UnexpectedElement { parent, child }
                if parent == "account" && child == "task"
        ));
    }

    #[test]
    fn missing_required_attribute_is_rejected() {
        let mut user = Element::new("user");
        user.set_attr(OID_ATTR, Oid::random().to_canonical());
        user.set_attr("name", "ada");
        user.set_attr("active", "true");

        assert!(matches!(
            element_to_record(&user, None).unwrap_err(),
            TreeError::MissingAttribute { attribute, .. } if attribute == "email"
        ));
    }

    #[test]
    fn malformed_attribute_text_reports_input_and_offset() {
        let mut user = Element::new("user");
        user.set_attr(OID_ATTR, Oid::random().to_canonical());
        user.set_attr("name", "ada");
        user.set_attr("email", "ada@example.org");
        user.set_attr("active", "yes");

        match element_to_record(&user, None).unwrap_err() {
            TreeError::Type(tempo_types::TypeError::Parse { input, offset, .. }) => {
                assert_eq!(input, "yes");
                assert_eq!(offset, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
