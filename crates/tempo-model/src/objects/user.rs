use tempo_types::Principal;

use crate::error::ModelResult;
use crate::kind::ObjectKind;
use crate::record::{ObjectRecord, PropertyMap, PropertyValue};
use crate::traits::Persistent;

/// A person tracked by the system.
///
/// User names form a global uniqueness scope (enforced by the validator).
/// Modifying or destroying a user is restricted to administrative
/// principals; everything else in the store is open by default.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct User {
    pub name: String,
    pub email: String,
    pub active: bool,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            active: true,
        }
    }
}

impl Persistent for User {
    fn kind(&self) -> ObjectKind {
        ObjectKind::User
    }

    fn serialize_properties(&self, props: &mut PropertyMap) {
        props.insert("name".into(), PropertyValue::Text(self.name.clone()));
        props.insert("email".into(), PropertyValue::Text(self.email.clone()));
        props.insert("active".into(), PropertyValue::Bool(self.active));
    }

    fn apply_properties(&mut self, record: &ObjectRecord) -> ModelResult<()> {
        self.name = record.require_text("name")?;
        self.email = record.require_text("email")?;
        self.active = record.require_bool("active")?;
        Ok(())
    }

    fn can_modify(&self, principal: &Principal) -> bool {
        principal.admin
    }

    fn can_destroy(&self, principal: &Principal) -> bool {
        principal.admin
    }
}
