use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tempo_types::{Oid, TypeError};

use crate::error::{ModelError, ModelResult};
use crate::kind::ObjectKind;

/// Storage type of a property, used by the serializers to pick column types
/// and to decode attribute text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyKind {
    Text,
    Integer,
    Real,
    Bool,
    Timestamp,
}

/// A single typed property value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Null,
}

impl PropertyValue {
    /// The storage type of this value, or `None` for `Null`.
    pub fn kind(&self) -> Option<PropertyKind> {
        match self {
            PropertyValue::Text(_) => Some(PropertyKind::Text),
            PropertyValue::Integer(_) => Some(PropertyKind::Integer),
            PropertyValue::Real(_) => Some(PropertyKind::Real),
            PropertyValue::Bool(_) => Some(PropertyKind::Bool),
            PropertyValue::Timestamp(_) => Some(PropertyKind::Timestamp),
            PropertyValue::Null => None,
        }
    }

    /// Encode as attribute text for the tree backend.
    ///
    /// `Null` has no text form; callers omit the attribute instead.
    pub fn to_text(&self) -> Option<String> {
        match self {
            PropertyValue::Text(s) => Some(s.clone()),
            PropertyValue::Integer(i) => Some(i.to_string()),
            PropertyValue::Real(r) => Some(format_real(*r)),
            PropertyValue::Bool(b) => Some(b.to_string()),
            PropertyValue::Timestamp(t) => {
                Some(t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            PropertyValue::Null => None,
        }
    }

    /// Decode attribute text into a value of the expected storage type.
    ///
    /// Fails with [`TypeError::Parse`] carrying the offending text and the
    /// byte offset of the first bad character.
    pub fn parse(kind: PropertyKind, text: &str) -> Result<Self, TypeError> {
        match kind {
            PropertyKind::Text => Ok(PropertyValue::Text(text.to_string())),
            PropertyKind::Integer => parse_integer(text).map(PropertyValue::Integer),
            PropertyKind::Real => text.parse::<f64>().map(PropertyValue::Real).map_err(|_| {
                TypeError::parse(text, bad_numeric_offset(text), "expected real number")
            }),
            PropertyKind::Bool => match text {
                "true" => Ok(PropertyValue::Bool(true)),
                "false" => Ok(PropertyValue::Bool(false)),
                _ => Err(TypeError::parse(text, 0, "expected 'true' or 'false'")),
            },
            PropertyKind::Timestamp => DateTime::parse_from_rfc3339(text)
                .map(|t| PropertyValue::Timestamp(t.with_timezone(&Utc)))
                .map_err(|e| TypeError::parse(text, 0, format!("bad timestamp: {e}"))),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("null"),
        }
    }
}

/// Render a real without losing information but without float noise for
/// whole values.
fn format_real(r: f64) -> String {
    if r.fract() == 0.0 && r.is_finite() && r.abs() < 1e15 {
        format!("{r:.1}")
    } else {
        format!("{r}")
    }
}

fn parse_integer(text: &str) -> Result<i64, TypeError> {
    match text.parse::<i64>() {
        Ok(i) => Ok(i),
        Err(_) => Err(TypeError::parse(
            text,
            bad_numeric_offset(text),
            "expected integer",
        )),
    }
}

/// Offset of the first character that cannot start or continue a number.
fn bad_numeric_offset(text: &str) -> usize {
    text.bytes()
        .position(|b| !(b.is_ascii_digit() || b == b'-' || b == b'+' || b == b'.' || b == b'e'))
        .unwrap_or(0)
}

/// Ordered name → value map of an object's scalar properties.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// An aggregation edge: the parent-side list of owned children.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildSet {
    pub edge: String,
    pub children: Vec<Oid>,
}

/// A single-valued association edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleRef {
    pub edge: String,
    pub target: Option<Oid>,
}

/// A multi-valued association edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiRef {
    pub edge: String,
    pub targets: Vec<Oid>,
}

/// Backend-neutral encoded form of one persistent object.
///
/// Produced by the object model's serialize hooks in their fixed order
/// (properties, then aggregations, then associations) and consumed by both
/// the row-oriented and the tree-oriented serializer. Round-trip fidelity at
/// this level is what guarantees round-trip fidelity of the backends.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub oid: Oid,
    pub kind: ObjectKind,
    /// Aggregation parent backpointer; `None` for root-collection kinds.
    pub parent: Option<Oid>,
    pub properties: PropertyMap,
    pub aggregations: Vec<ChildSet>,
    pub references: Vec<SingleRef>,
    pub reference_lists: Vec<MultiRef>,
}

impl ObjectRecord {
    /// An empty record of the given kind and identity.
    pub fn new(oid: Oid, kind: ObjectKind) -> Self {
        Self {
            oid,
            kind,
            parent: None,
            properties: PropertyMap::new(),
            aggregations: Vec::new(),
            references: Vec::new(),
            reference_lists: Vec::new(),
        }
    }

    /// Required property lookup with kind-aware errors.
    pub fn require(&self, name: &str) -> ModelResult<&PropertyValue> {
        self.properties
            .get(name)
            .ok_or_else(|| ModelError::MissingProperty {
                kind: self.kind,
                name: name.to_string(),
            })
    }

    /// Required text property.
    pub fn require_text(&self, name: &str) -> ModelResult<String> {
        match self.require(name)? {
            PropertyValue::Text(s) => Ok(s.clone()),
            _ => Err(self.type_error(name, "text")),
        }
    }

    /// Required bool property.
    pub fn require_bool(&self, name: &str) -> ModelResult<bool> {
        match self.require(name)? {
            PropertyValue::Bool(b) => Ok(*b),
            _ => Err(self.type_error(name, "bool")),
        }
    }

    /// Required real property.
    pub fn require_real(&self, name: &str) -> ModelResult<f64> {
        match self.require(name)? {
            PropertyValue::Real(r) => Ok(*r),
            PropertyValue::Integer(i) => Ok(*i as f64),
            _ => Err(self.type_error(name, "real")),
        }
    }

    /// Required timestamp property.
    pub fn require_timestamp(&self, name: &str) -> ModelResult<DateTime<Utc>> {
        match self.require(name)? {
            PropertyValue::Timestamp(t) => Ok(*t),
            _ => Err(self.type_error(name, "timestamp")),
        }
    }

    /// Optional timestamp property (`Null` and absent both mean `None`).
    pub fn optional_timestamp(&self, name: &str) -> ModelResult<Option<DateTime<Utc>>> {
        match self.properties.get(name) {
            None | Some(PropertyValue::Null) => Ok(None),
            Some(PropertyValue::Timestamp(t)) => Ok(Some(*t)),
            Some(_) => Err(self.type_error(name, "timestamp")),
        }
    }

    /// The target of a single-valued association edge, if recorded.
    pub fn reference(&self, edge: &str) -> Option<Oid> {
        self.references
            .iter()
            .find(|r| r.edge == edge)
            .and_then(|r| r.target)
    }

    /// The targets of a multi-valued association edge.
    pub fn reference_list(&self, edge: &str) -> Vec<Oid> {
        self.reference_lists
            .iter()
            .find(|r| r.edge == edge)
            .map(|r| r.targets.clone())
            .unwrap_or_default()
    }

    /// The children of an aggregation edge.
    pub fn children(&self, edge: &str) -> Vec<Oid> {
        self.aggregations
            .iter()
            .find(|c| c.edge == edge)
            .map(|c| c.children.clone())
            .unwrap_or_default()
    }

    fn type_error(&self, name: &str, expected: &str) -> ModelError {
        ModelError::PropertyType {
            kind: self.kind,
            name: name.to_string(),
            expected: expected.to_string(),
        }
    }
}
