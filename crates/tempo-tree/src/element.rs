//! Element/attribute document model.
//!
//! A parsed document tree with read-write element and attribute access.
//! Parsing a markup syntax is out of scope; documents persist through the
//! serde representation of [`Element`]. Object elements carry their identity
//! in the [`OID_ATTR`] attribute, which is what the traversal helpers key on.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tempo_types::Oid;

/// Attribute holding an object element's identity.
pub const OID_ATTR: &str = "oid";

/// One node of the document tree: a name, attributes, nested children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn add_child(&mut self, child: Element) {
        self.children.push(child);
    }

    /// The identity of this element, if it carries one. The document root
    /// does not.
    pub fn oid(&self) -> Option<Oid> {
        self.attr(OID_ATTR).and_then(|text| Oid::parse(text).ok())
    }

    /// Depth-first search for the element identified by `oid`.
    pub fn find_descendant(&self, oid: Oid) -> Option<&Element> {
        for child in &self.children {
            if child.oid() == Some(oid) {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(oid) {
                return Some(found);
            }
        }
        None
    }

    pub fn find_descendant_mut(&mut self, oid: Oid) -> Option<&mut Element> {
        for child in &mut self.children {
            if child.oid() == Some(oid) {
                return Some(child);
            }
            if let Some(found) = child.find_descendant_mut(oid) {
                return Some(found);
            }
        }
        None
    }

    /// Depth-first search returning the element together with the identity
    /// of its enclosing element (`None` for children of the search root).
    pub fn find_with_parent(&self, oid: Oid) -> Option<(&Element, Option<Oid>)> {
        for child in &self.children {
            if child.oid() == Some(oid) {
                return Some((child, self.oid()));
            }
            if let Some(found) = child.find_with_parent(oid) {
                return Some(found);
            }
        }
        None
    }

    /// Detach the element identified by `oid`, wherever it is nested.
    /// Returns `false` if no such element exists.
    pub fn remove_descendant(&mut self, oid: Oid) -> bool {
        if let Some(index) = self
            .children
            .iter()
            .position(|child| child.oid() == Some(oid))
        {
            self.children.remove(index);
            return true;
        }
        self.children
            .iter_mut()
            .any(|child| child.remove_descendant(oid))
    }

    /// Number of elements in this subtree, the element itself included.
    pub fn subtree_size(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(Element::subtree_size)
            .sum::<usize>()
    }
}
