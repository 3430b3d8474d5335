//! Current-Version Facade
//!
//! An owner row has many version rows but exposes one: the version its
//! pointer column (`local_key`) refers to. Saving the owner saves the
//! current version first and only then moves the pointer, so the pointer
//! never refers to a row that was not written.
//!
//! ## Logging Ownership
//!
//! `owner_save` and `owner_destroy` log their lifecycle here; the nested
//! version operations log their own.

#![allow(clippy::result_large_err)]

use std::path::PathBuf;
use std::time::Instant;

use versions_core::errors::{ExError, ExErrorKind, Result};
use versions_core::model::{Attributes, ErrorSet, Record, Value};
use versions_core::policy::{DefaultVersionPolicy, NoopOwnerPolicy, OwnerPolicy, VersionPolicy};
use versions_core::{log_op_end, log_op_error, log_op_start};
use versions_core_types::RecordId;
use versions_store::attachments::{AttachmentStore, Upload};
use versions_store::{lineage, Order, Table, TxConnection};

use crate::auto::{Versioned, BASE};
use crate::version::{Version, NUMBER_COLUMN};

/// An owner row with its lazily resolved current version
#[derive(Debug, Clone, Default)]
pub struct Owner {
    record: Record,
    current: Option<Version>,
    versions: Option<Vec<Version>>,
}

impl Owner {
    pub fn id(&self) -> Option<RecordId> {
        self.record.id()
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn get(&self, name: &str) -> &Value {
        self.record.get(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) {
        self.record.set(name, value);
    }

    pub fn assign_attributes(&mut self, attributes: Attributes) {
        self.record.assign(attributes);
    }

    pub fn errors(&self) -> &ErrorSet {
        self.record.errors()
    }

    pub fn is_new_record(&self) -> bool {
        self.record.is_new_record()
    }

    pub fn is_destroyed(&self) -> bool {
        self.record.is_destroyed()
    }

    pub fn is_changed(&self) -> bool {
        self.record.is_changed()
    }

    /// The current version if it was already resolved
    pub fn loaded_version(&self) -> Option<&Version> {
        self.current.as_ref()
    }

    fn persisted_id(&self) -> Option<RecordId> {
        self.id().filter(|_| !self.is_new_record())
    }

    fn restore(&mut self, snapshot: Owner) {
        let errors = self.record.errors().clone();
        let version_errors = self.current.as_ref().map(|v| v.errors().clone());
        *self = snapshot;
        *self.record.errors_mut() = errors;
        if let (Some(version), Some(errors)) = (self.current.as_mut(), version_errors) {
            *version.record.errors_mut() = errors;
        }
    }
}

/// Configures a [`HasMultiple`] relation
#[derive(Debug)]
pub struct HasMultipleBuilder<P, O> {
    association: String,
    owner_table: Option<String>,
    version_table: Option<String>,
    foreign_key: Option<String>,
    local_key: Option<String>,
    inverse: Option<String>,
    policy: P,
    owner_policy: O,
    attachments: Option<AttachmentStore>,
}

impl<P: VersionPolicy, O: OwnerPolicy> HasMultipleBuilder<P, O> {
    pub fn owner_table(mut self, table: &str) -> Self {
        self.owner_table = Some(table.to_string());
        self
    }

    /// Version table; defaults to the association name
    pub fn version_table(mut self, table: &str) -> Self {
        self.version_table = Some(table.to_string());
        self
    }

    /// Version column pointing at the owner; defaults to `{inverse}_id`
    pub fn foreign_key(mut self, column: &str) -> Self {
        self.foreign_key = Some(column.to_string());
        self
    }

    /// Owner column pointing at the current version; defaults to `{name}_id`
    pub fn local_key(mut self, column: &str) -> Self {
        self.local_key = Some(column.to_string());
        self
    }

    /// Name of the owner as seen from a version; defaults to the singular
    /// of the owner table
    pub fn inverse(mut self, name: &str) -> Self {
        self.inverse = Some(name.to_string());
        self
    }

    pub fn policy<Q: VersionPolicy>(self, policy: Q) -> HasMultipleBuilder<Q, O> {
        HasMultipleBuilder {
            association: self.association,
            owner_table: self.owner_table,
            version_table: self.version_table,
            foreign_key: self.foreign_key,
            local_key: self.local_key,
            inverse: self.inverse,
            policy,
            owner_policy: self.owner_policy,
            attachments: self.attachments,
        }
    }

    pub fn owner_policy<Q: OwnerPolicy>(self, owner_policy: Q) -> HasMultipleBuilder<P, Q> {
        HasMultipleBuilder {
            association: self.association,
            owner_table: self.owner_table,
            version_table: self.version_table,
            foreign_key: self.foreign_key,
            local_key: self.local_key,
            inverse: self.inverse,
            policy: self.policy,
            owner_policy,
            attachments: self.attachments,
        }
    }

    pub fn attachments(mut self, store: AttachmentStore) -> Self {
        self.attachments = Some(store);
        self
    }

    /// Resolve defaults and check every column against the live schema
    ///
    /// # Errors
    ///
    /// `InvalidInput` without an owner table; `MissingColumn` when the
    /// version table lacks `number` or the foreign key, or the owner table
    /// lacks the local key.
    pub fn build(self, tx: &TxConnection) -> Result<HasMultiple<P, O>> {
        let owner_table_name = self.owner_table.ok_or_else(|| {
            ExError::new(ExErrorKind::InvalidInput)
                .with_op("has_multiple")
                .with_message(format!(
                    "has_multiple {} needs an owner table",
                    self.association
                ))
        })?;

        let name = singularize(&self.association);
        let inverse = self
            .inverse
            .unwrap_or_else(|| singularize(&owner_table_name));
        let foreign_key = self
            .foreign_key
            .unwrap_or_else(|| format!("{}_id", inverse));
        let local_key = self.local_key.unwrap_or_else(|| format!("{}_id", name));
        let version_table = self
            .version_table
            .unwrap_or_else(|| self.association.clone());

        let mut versioned = Versioned::builder(&version_table).policy(self.policy);
        if let Some(store) = self.attachments {
            versioned = versioned.attachments(store);
        }
        let versioned = versioned.build(tx)?;
        versioned.table().require_column(&foreign_key)?;

        let owner_table = Table::load(tx, &owner_table_name)?;
        owner_table.require_column(&local_key)?;

        Ok(HasMultiple {
            name,
            inverse,
            foreign_key,
            local_key,
            owner_table,
            versioned,
            owner_policy: self.owner_policy,
        })
    }
}

/// One owner table hiding an ordered list of versions behind a single
/// current version
#[derive(Debug)]
pub struct HasMultiple<P = DefaultVersionPolicy, O = NoopOwnerPolicy> {
    name: String,
    inverse: String,
    foreign_key: String,
    local_key: String,
    owner_table: Table,
    versioned: Versioned<P>,
    owner_policy: O,
}

impl HasMultiple<DefaultVersionPolicy, NoopOwnerPolicy> {
    /// Start a declaration for an association such as `"versions"`
    pub fn builder(association: &str) -> HasMultipleBuilder<DefaultVersionPolicy, NoopOwnerPolicy> {
        HasMultipleBuilder {
            association: association.to_string(),
            owner_table: None,
            version_table: None,
            foreign_key: None,
            local_key: None,
            inverse: None,
            policy: DefaultVersionPolicy,
            owner_policy: NoopOwnerPolicy,
            attachments: None,
        }
    }
}

impl<P: VersionPolicy, O: OwnerPolicy> HasMultiple<P, O> {
    /// Facade name (`version` for `versions`), also the error key prefix
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn inverse(&self) -> &str {
        &self.inverse
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }

    pub fn local_key(&self) -> &str {
        &self.local_key
    }

    pub fn owner_table(&self) -> &Table {
        &self.owner_table
    }

    pub fn versioned(&self) -> &Versioned<P> {
        &self.versioned
    }

    pub fn new_owner(&self) -> Owner {
        Owner::default()
    }

    pub fn find(&self, tx: &TxConnection, id: RecordId) -> Result<Option<Owner>> {
        Ok(self.owner_table.find(tx, id)?.map(|record| Owner {
            record,
            ..Owner::default()
        }))
    }

    pub fn get(&self, tx: &TxConnection, id: RecordId) -> Result<Owner> {
        self.owner_table.get(tx, id).map(|record| Owner {
            record,
            ..Owner::default()
        })
    }

    /// Build and save an owner together with its first version
    pub fn create(
        &self,
        tx: &TxConnection,
        owner_attributes: Attributes,
        version_attributes: Attributes,
    ) -> Result<Owner> {
        let mut owner = self.new_owner();
        owner.assign_attributes(owner_attributes);
        self.set_version_attributes(tx, &mut owner, version_attributes)?;
        self.save(tx, &mut owner)?;
        Ok(owner)
    }

    /// The current version, resolved on first access
    ///
    /// Loads the row the pointer refers to, or starts a new unsaved version
    /// when the pointer is empty.
    ///
    /// # Errors
    ///
    /// `NotFound` if the pointer refers to a missing row.
    pub fn version<'a>(&self, tx: &TxConnection, owner: &'a mut Owner) -> Result<&'a mut Version> {
        let version = match owner.current.take() {
            Some(version) => version,
            None => self.resolve_current(tx, owner)?,
        };
        Ok(owner.current.insert(version))
    }

    fn resolve_current(&self, tx: &TxConnection, owner: &Owner) -> Result<Version> {
        if let Some(id) = owner.get(&self.local_key).as_i64() {
            return self.versioned.get(tx, RecordId::new(id));
        }
        let mut version = self.versioned.new_version();
        if let Some(owner_id) = owner.persisted_id() {
            version.record.set(&self.foreign_key, owner_id);
        }
        Ok(version)
    }

    /// Replace the in-memory current version; nothing is written until save
    pub fn set_version(&self, owner: &mut Owner, version: Version) {
        owner.current = Some(version);
    }

    /// Mass-assign the current version's attributes
    pub fn set_version_attributes(
        &self,
        tx: &TxConnection,
        owner: &mut Owner,
        attributes: Attributes,
    ) -> Result<()> {
        self.version(tx, owner)?.assign_attributes(attributes);
        Ok(())
    }

    /// All versions of the owner, highest number first (cached on the owner)
    pub fn versions<'a>(&self, tx: &TxConnection, owner: &'a mut Owner) -> Result<&'a [Version]> {
        if owner.versions.is_none() {
            let list = match owner.persisted_id() {
                Some(id) => self
                    .versioned
                    .table()
                    .find_where(
                        tx,
                        &self.foreign_key,
                        &Value::from(id),
                        Some(Order::Desc(NUMBER_COLUMN)),
                    )?
                    .into_iter()
                    .map(Version::from_record)
                    .collect(),
                None => Vec::new(),
            };
            owner.versions = Some(list);
        }
        Ok(owner.versions.as_deref().unwrap_or_default())
    }

    /// Number of stored versions of the owner
    pub fn count_versions(&self, tx: &TxConnection, owner: &Owner) -> Result<i64> {
        match owner.persisted_id() {
            Some(id) => self.versioned.table().count_where(
                tx,
                &self.foreign_key,
                &Value::from(id),
                None,
            ),
            None => Ok(0),
        }
    }

    /// Id of the current version as stored in the pointer column
    pub fn pointer(&self, owner: &Owner) -> Option<RecordId> {
        owner.get(&self.local_key).as_i64().map(RecordId::new)
    }

    /// Assign version attributes and save the owner
    pub fn update_version(
        &self,
        tx: &TxConnection,
        owner: &mut Owner,
        attributes: Attributes,
    ) -> Result<bool> {
        self.set_version_attributes(tx, owner, attributes)?;
        self.save(tx, owner)
    }

    /// Validate and save the owner with its current version
    ///
    /// Returns `Ok(false)` with messages in `owner.errors()` (version errors
    /// prefixed with the facade name) when anything refused the save. The
    /// owner and its current version are then back in their pre-save state.
    pub fn save(&self, tx: &TxConnection, owner: &mut Owner) -> Result<bool> {
        self.save_with(tx, owner, true)
    }

    /// Save skipping owner and version validations
    pub fn save_without_validation(&self, tx: &TxConnection, owner: &mut Owner) -> Result<bool> {
        self.save_with(tx, owner, false)
    }

    fn save_with(&self, tx: &TxConnection, owner: &mut Owner, validate: bool) -> Result<bool> {
        log_op_start!(
            "owner_save",
            table = self.owner_table.name(),
            owner_id = ?owner.id()
        );
        let start = Instant::now();

        let saved = self.save_impl(tx, owner, validate).map_err(|e| {
            log_op_error!(
                "owner_save",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "owner_save",
            duration_ms = start.elapsed().as_millis() as u64,
            saved = saved,
            owner_id = ?owner.id(),
            version_id = ?self.pointer(owner)
        );
        Ok(saved)
    }

    fn save_impl(&self, tx: &TxConnection, owner: &mut Owner, validate: bool) -> Result<bool> {
        owner.record.errors_mut().clear();

        // Destroying the only remaining version destroys the owner.
        let last_marked = owner
            .current
            .as_ref()
            .is_some_and(|v| v.is_marked_for_destruction() && !v.is_new_record());
        if last_marked && self.count_versions(tx, owner)? == 1 {
            return self.destroy_impl(tx, owner);
        }

        if validate {
            self.validate(tx, owner)?;
            if !owner.errors().is_empty() {
                return Ok(false);
            }
        }

        let snapshot = owner.clone();
        let result = tx.transaction_if(|tx| {
            if owner.is_new_record() {
                self.insert_owner(tx, owner)
            } else {
                self.update_owner(tx, owner)
            }
        });

        match result {
            Ok(true) => Ok(true),
            Ok(false) => {
                owner.restore(snapshot);
                Ok(false)
            }
            // rows are committed, only the follow-up work failed
            Err(err) if err.kind().is_after_commit() => Err(err),
            Err(err) => {
                owner.restore(snapshot);
                Err(err)
            }
        }
    }

    /// Owner policy plus the current version's own validation, merged with
    /// prefixed keys
    fn validate(&self, tx: &TxConnection, owner: &mut Owner) -> Result<()> {
        let mut errors = ErrorSet::new();
        self.owner_policy.validate(&owner.record, &mut errors);

        let version = self.version(tx, owner)?;
        if !version.is_marked_for_destruction() {
            let mut version_errors = ErrorSet::new();
            self.versioned
                .policy()
                .validate(&version.record, &mut version_errors);
            *version.record.errors_mut() = version_errors.clone();
            errors.merge_prefixed(&self.name, &version_errors);
        }

        let owner_errors = owner.record.errors_mut();
        for (attribute, message) in errors.iter() {
            owner_errors.add(attribute, message);
        }
        Ok(())
    }

    fn merge_version_errors(&self, owner: &mut Owner) {
        let version_errors = match &owner.current {
            Some(version) => version.errors().clone(),
            None => return,
        };
        owner
            .record
            .errors_mut()
            .merge_prefixed(&self.name, &version_errors);
    }

    /// Insert the owner, then its version, then point the owner at it
    fn insert_owner(&self, tx: &TxConnection, owner: &mut Owner) -> Result<bool> {
        if !self.write_owner(tx, owner, true)? {
            return Ok(false);
        }
        let Some(owner_id) = owner.id() else {
            return Ok(false);
        };

        let version = owner.current.get_or_insert_with(Version::new);
        version.record.set(&self.foreign_key, owner_id);
        if !self.versioned.save_without_validation(tx, version)? {
            self.merge_version_errors(owner);
            return Ok(false);
        }

        let (Some(version_id), Some(number)) = (version.id(), version.number()) else {
            return Ok(false);
        };
        lineage::record_number(tx, self.owner_table.name(), owner_id, number)?;

        // Internal write: no hooks, no timestamps, no change tracking.
        let pointer = Value::from(version_id);
        self.owner_table
            .update_column(tx, owner_id, &self.local_key, &pointer)?;
        owner.record.write_raw(&self.local_key, pointer);
        owner.record.clear_change(&self.local_key);
        Ok(true)
    }

    /// Save or destroy the current version, move the pointer, update the owner
    fn update_owner(&self, tx: &TxConnection, owner: &mut Owner) -> Result<bool> {
        let Some(owner_id) = owner.persisted_id() else {
            return Ok(false);
        };

        if let Some(version) = owner.current.as_mut() {
            if version.is_marked_for_destruction() {
                let destroyed_id = version.id();
                if !self.versioned.destroy(tx, version)? {
                    self.merge_version_errors(owner);
                    return Ok(false);
                }
                self.version_destroyed(owner, destroyed_id);
                let latest = self.versioned.table().first_where(
                    tx,
                    &self.foreign_key,
                    &Value::from(owner_id),
                    Some(Order::Desc(NUMBER_COLUMN)),
                )?;
                let pointer = latest
                    .and_then(|record| record.id())
                    .map_or(Value::Null, Value::from);
                owner.record.set(&self.local_key, pointer);
                owner.current = None;
            } else if version.needs_save() {
                version.record.set(&self.foreign_key, owner_id);
                if version.previous_number().is_none() {
                    let last = lineage::last_number(tx, self.owner_table.name(), owner_id)?;
                    // forks continue from the highest of lineage, policy and own number
                    let seed = if version.is_new_record() {
                        last
                    } else {
                        let hook = self.versioned.policy().previous_number(&version.record);
                        [last, hook, version.number()].into_iter().flatten().max()
                    };
                    if let Some(seed) = seed {
                        version.set_previous_number(seed);
                    }
                }

                if !self.versioned.save_without_validation(tx, version)? {
                    self.merge_version_errors(owner);
                    return Ok(false);
                }

                let (Some(version_id), Some(number)) = (version.id(), version.number()) else {
                    return Ok(false);
                };
                lineage::record_number(tx, self.owner_table.name(), owner_id, number)?;
                let saved = version.clone();
                owner.record.set(&self.local_key, version_id);
                self.version_saved(owner, saved);
            }
        }

        self.write_owner(tx, owner, false)
    }

    /// Insert or update the owner row; constraint failures become errors
    fn write_owner(&self, tx: &TxConnection, owner: &mut Owner, insert: bool) -> Result<bool> {
        let written = if insert {
            self.owner_table.insert(tx, &mut owner.record).map(|_| ())
        } else {
            self.owner_table.update(tx, &mut owner.record).map(|_| ())
        };
        match written {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ExErrorKind::ConstraintViolation => {
                owner.record.errors_mut().add(BASE, err.message().to_string());
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Keep a loaded version list in step after a destroy
    fn version_destroyed(&self, owner: &mut Owner, destroyed_id: Option<RecordId>) {
        if let Some(list) = owner.versions.as_mut() {
            list.retain(|v| v.id() != destroyed_id);
        }
    }

    /// Keep a loaded version list in step after a save
    fn version_saved(&self, owner: &mut Owner, saved: Version) {
        let Some(list) = owner.versions.as_mut() else {
            return;
        };
        match list.iter_mut().find(|v| v.id() == saved.id()) {
            Some(existing) => *existing = saved,
            None => list.insert(0, saved),
        }
    }

    /// Destroy every version (each through `can_destroy`), then the owner
    pub fn destroy(&self, tx: &TxConnection, owner: &mut Owner) -> Result<bool> {
        owner.record.errors_mut().clear();
        self.destroy_impl(tx, owner)
    }

    fn destroy_impl(&self, tx: &TxConnection, owner: &mut Owner) -> Result<bool> {
        log_op_start!(
            "owner_destroy",
            table = self.owner_table.name(),
            owner_id = ?owner.id()
        );
        let start = Instant::now();

        let snapshot = owner.clone();
        let result = tx.transaction_if(|tx| self.destroy_rows(tx, owner));
        let destroyed = match result {
            Ok(true) => {
                owner.record.mark_destroyed();
                owner.current = None;
                owner.versions = Some(Vec::new());
                true
            }
            Ok(false) => {
                owner.restore(snapshot);
                false
            }
            Err(err) => {
                if err.kind().is_after_commit() {
                    owner.record.mark_destroyed();
                    owner.current = None;
                    owner.versions = Some(Vec::new());
                } else {
                    owner.restore(snapshot);
                }
                log_op_error!(
                    "owner_destroy",
                    err.clone(),
                    duration_ms = start.elapsed().as_millis() as u64
                );
                return Err(err);
            }
        };

        log_op_end!(
            "owner_destroy",
            duration_ms = start.elapsed().as_millis() as u64,
            destroyed = destroyed
        );
        Ok(destroyed)
    }

    fn destroy_rows(&self, tx: &TxConnection, owner: &mut Owner) -> Result<bool> {
        let Some(owner_id) = owner.persisted_id() else {
            return Ok(true);
        };

        self.owner_table
            .update_column(tx, owner_id, &self.local_key, &Value::Null)?;

        let rows = self.versioned.table().find_where(
            tx,
            &self.foreign_key,
            &Value::from(owner_id),
            Some(Order::Desc(NUMBER_COLUMN)),
        )?;
        for record in rows {
            let mut version = Version::from_record(record);
            if !self.versioned.destroy(tx, &mut version)? {
                owner
                    .record
                    .errors_mut()
                    .merge_prefixed(&self.name, version.errors());
                return Ok(false);
            }
        }

        self.owner_table.delete(tx, owner_id)?;
        lineage::forget(tx, self.owner_table.name(), owner_id)?;
        Ok(true)
    }

    /// Give the current version a new file; written on the next save
    pub fn set_file(&self, tx: &TxConnection, owner: &mut Owner, upload: Upload) -> Result<()> {
        let version = self.version(tx, owner)?;
        self.versioned.set_file(version, upload)
    }

    pub fn file_path(&self, tx: &TxConnection, owner: &mut Owner) -> Result<Option<PathBuf>> {
        let version = self.version(tx, owner)?;
        self.versioned.file_path(tx, version)
    }

    pub fn read_file(&self, tx: &TxConnection, owner: &mut Owner) -> Result<Option<Vec<u8>>> {
        let version = self.version(tx, owner)?;
        self.versioned.read_file(tx, version)
    }
}

/// `versions` -> `version`, `stories` -> `story`, `pages` -> `page`
fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        format!("{}y", stem)
    } else if let Some(stem) = word.strip_suffix('s').filter(|s| !s.ends_with('s')) {
        stem.to_string()
    } else {
        word.to_string()
    }
}
