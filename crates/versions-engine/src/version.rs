//! A version row plus the state the clone engine keeps between saves

use versions_core::model::{Attributes, ErrorSet, Record, Value};
use versions_core_types::RecordId;
use versions_store::attachments::{Attachment, ATTACHMENT_COLUMN};

use crate::destroy::{is_destroy_key, requests_destroy};

pub const NUMBER_COLUMN: &str = "number";

/// File change waiting for the next save
#[derive(Debug, Clone, Default)]
pub(crate) struct AttachmentSlot {
    pub(crate) pending: Option<Attachment>,
    /// Attachment the row pointed at before the file was replaced
    pub(crate) to_unlink: Option<RecordId>,
}

#[derive(Debug, Clone, Default)]
pub struct Version {
    pub(crate) record: Record,
    pub(crate) previous_id: Option<RecordId>,
    pub(crate) previous_number: Option<i64>,
    pub(crate) marked_for_destruction: bool,
    pub(crate) attachment: AttachmentSlot,
}

impl Version {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attributes(attributes: Attributes) -> Self {
        let mut version = Self::new();
        version.assign_attributes(attributes);
        version
    }

    pub fn from_record(record: Record) -> Self {
        Self {
            record,
            ..Self::default()
        }
    }

    pub fn id(&self) -> Option<RecordId> {
        self.record.id()
    }

    pub fn number(&self) -> Option<i64> {
        self.record.get(NUMBER_COLUMN).as_i64()
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn get(&self, name: &str) -> &Value {
        self.record.get(name)
    }

    /// Assign one attribute (same rules as `assign_attributes`)
    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        let value = value.into();
        if is_destroy_key(name) {
            if requests_destroy(&value) {
                self.marked_for_destruction = true;
            }
            return;
        }
        if name == "id" || name == NUMBER_COLUMN {
            tracing::warn!(attribute = name, "protected attribute ignored in assignment");
            return;
        }
        self.record.set(name, value);
    }

    /// Mass assignment
    ///
    /// `id` and `number` are protected and ignored. A truthy destroy flag
    /// marks the version for destruction instead of being stored.
    pub fn assign_attributes(&mut self, attributes: Attributes) {
        for (name, value) in attributes {
            self.set(&name, value);
        }
    }

    /// True iff the last successful save inserted a fork
    pub fn was_cloned(&self) -> bool {
        self.previous_id.is_some()
    }

    /// Id of the row the last fork was cloned from
    pub fn previous_id(&self) -> Option<RecordId> {
        self.previous_id
    }

    /// Seed the fork counter for the next save
    pub fn set_previous_number(&mut self, number: i64) {
        self.previous_number = Some(number);
    }

    pub fn previous_number(&self) -> Option<i64> {
        self.previous_number
    }

    pub fn mark_for_destruction(&mut self) {
        self.marked_for_destruction = true;
    }

    pub fn is_marked_for_destruction(&self) -> bool {
        self.marked_for_destruction
    }

    pub fn is_new_record(&self) -> bool {
        self.record.is_new_record()
    }

    pub fn is_destroyed(&self) -> bool {
        self.record.is_destroyed()
    }

    /// Content changed since load, including a file waiting to be saved
    pub fn is_changed(&self) -> bool {
        self.record.is_changed() || self.attachment.pending.is_some()
    }

    /// New rows are always written; persisted rows only when changed
    pub fn needs_save(&self) -> bool {
        self.is_new_record() || self.is_changed()
    }

    pub fn errors(&self) -> &ErrorSet {
        self.record.errors()
    }

    pub fn attachment_id(&self) -> Option<RecordId> {
        self.record.get(ATTACHMENT_COLUMN).as_i64().map(RecordId::new)
    }

    pub fn has_pending_file(&self) -> bool {
        self.attachment.pending.is_some()
    }

    /// Put back a pre-save snapshot, keeping the errors of the failed save
    pub(crate) fn restore(&mut self, snapshot: Version) {
        let errors = self.record.errors().clone();
        *self = snapshot;
        *self.record.errors_mut() = errors;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use versions_core::attrs;

    #[test]
    fn test_protected_attributes_are_ignored() {
        let version = Version::with_attributes(attrs! { "title" => "A", "number" => 9, "id" => 4 });
        assert_eq!(version.get("title"), &Value::from("A"));
        assert_eq!(version.number(), None);
        assert_eq!(version.id(), None);
    }

    #[test]
    fn test_destroy_flag_marks_instead_of_assigning() {
        let mut version = Version::new();
        version.assign_attributes(attrs! { "__destroy" => true });
        assert!(version.is_marked_for_destruction());
        assert!(version.get("__destroy").is_null());

        let mut version = Version::new();
        version.assign_attributes(attrs! { ":__destroy" => "1" });
        assert!(version.is_marked_for_destruction());
    }

    #[test]
    fn test_false_destroy_flag_is_ignored() {
        let mut version = Version::new();
        version.assign_attributes(attrs! { "__destroy" => "false" });
        assert!(!version.is_marked_for_destruction());
    }

    #[test]
    fn test_new_version_needs_save() {
        let version = Version::new();
        assert!(!version.is_changed());
        assert!(version.needs_save());
    }

    #[test]
    fn test_restore_keeps_errors() {
        let mut version = Version::with_attributes(attrs! { "title" => "A" });
        let snapshot = version.clone();
        version.set("title", "B");
        version.record.errors_mut().add("base", "failed");

        version.restore(snapshot);

        assert_eq!(version.get("title"), &Value::from("A"));
        assert_eq!(version.errors().first("base"), Some("failed"));
    }
}
