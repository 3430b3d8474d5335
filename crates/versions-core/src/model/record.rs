use std::collections::BTreeMap;

use versions_core_types::RecordId;

use super::{Attributes, ErrorSet, Value};

static NULL: Value = Value::Null;

/// A change-tracked row
///
/// `changes` holds the value each attribute had when it was loaded (or last
/// persisted). Assigning the original value back removes the entry, so
/// `is_changed()` reports real content changes only.
#[derive(Debug, Clone, Default)]
pub struct Record {
    id: Option<RecordId>,
    attributes: Attributes,
    changes: BTreeMap<String, Value>,
    errors: ErrorSet,
    persisted: bool,
    destroyed: bool,
}

impl Record {
    /// A new, unsaved record
    pub fn new() -> Self {
        Self::default()
    }

    /// A record loaded from storage, with no pending changes
    pub fn from_row(id: RecordId, attributes: Attributes) -> Self {
        Self {
            id: Some(id),
            attributes,
            changes: BTreeMap::new(),
            errors: ErrorSet::new(),
            persisted: true,
            destroyed: false,
        }
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub fn is_new_record(&self) -> bool {
        !self.persisted
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Value of an attribute (`Null` when absent)
    pub fn get(&self, name: &str) -> &Value {
        self.attributes.get(name).unwrap_or(&NULL)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Assign an attribute, tracking the change
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        let current = self.get(name).clone();
        if current == value {
            return;
        }

        match self.changes.get(name).cloned() {
            Some(original) if original == value => {
                self.changes.remove(name);
            }
            Some(_) => {}
            None => {
                self.changes.insert(name.to_string(), current);
            }
        }
        self.attributes.insert(name.to_string(), value);
    }

    /// Assign several attributes, tracking changes
    pub fn assign(&mut self, attributes: Attributes) {
        for (name, value) in attributes {
            self.set(&name, value);
        }
    }

    /// Write an attribute without change tracking
    ///
    /// Used for values already durable in storage (bypass writes, timestamps)
    /// so a later save does not try to write them again.
    pub fn write_raw(&mut self, name: &str, value: impl Into<Value>) {
        self.attributes.insert(name.to_string(), value.into());
        self.changes.remove(name);
    }

    pub fn is_changed(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn is_attribute_changed(&self, name: &str) -> bool {
        self.changes.contains_key(name)
    }

    /// Names of changed attributes, sorted
    pub fn changed_attributes(&self) -> Vec<&str> {
        self.changes.keys().map(String::as_str).collect()
    }

    /// Value an attribute had before it was changed
    pub fn original(&self, name: &str) -> Option<&Value> {
        self.changes.get(name)
    }

    pub fn clear_changes(&mut self) {
        self.changes.clear();
    }

    pub fn clear_change(&mut self, name: &str) {
        self.changes.remove(name);
    }

    pub fn errors(&self) -> &ErrorSet {
        &self.errors
    }

    pub fn errors_mut(&mut self) -> &mut ErrorSet {
        &mut self.errors
    }

    /// Record a successful insert
    pub fn mark_persisted(&mut self, id: RecordId) {
        self.id = Some(id);
        self.persisted = true;
        self.changes.clear();
    }

    /// Turn the record back into an unsaved one (fork or rollback of an insert)
    ///
    /// Attributes and change tracking are kept so the next insert writes the
    /// full row.
    pub fn mark_new(&mut self) {
        self.id = None;
        self.persisted = false;
    }

    pub fn mark_destroyed(&mut self) {
        self.destroyed = true;
    }
}
