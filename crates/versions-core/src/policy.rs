//! Caller-supplied policies for versioned records
//!
//! The versioning engine consults a `VersionPolicy` at each decision point
//! (fork or update in place, counter seed, post-fork adjustment, validation,
//! destruction). Owners get an `OwnerPolicy` for their own validations.

use crate::errors::{Result, VersionsError};
use crate::model::{ErrorSet, Record};

/// Decision points of the version clone engine
///
/// Every method has a default; only `can_destroy` defaults to a
/// configuration error so destruction is never allowed by accident.
pub trait VersionPolicy {
    /// Whether a changed, persisted version should be saved as a new row
    fn should_fork(&self, _version: &Record) -> bool {
        true
    }

    /// Seed for the fork counter; `None` uses the version's own number
    fn previous_number(&self, _version: &Record) -> Option<i64> {
        None
    }

    /// Adjust fields of a forked version before it is inserted
    fn after_fork(&self, _version: &mut Record) {}

    /// Content validation; add messages to `errors` to reject the save
    fn validate(&self, _version: &Record, _errors: &mut ErrorSet) {}

    /// Last check before the row is written; add messages to abort the save
    fn before_persist(&self, _version: &Record, _errors: &mut ErrorSet) {}

    /// Whether the version may be destroyed
    ///
    /// # Errors
    ///
    /// The default returns `ExErrorKind::MissingOverride`: policies that
    /// allow destruction must say so explicitly.
    #[allow(clippy::result_large_err)]
    fn can_destroy(&self, _version: &Record, table: &str) -> Result<bool> {
        Err(VersionsError::DestroyPolicyUndefined {
            table: table.to_string(),
        }
        .into())
    }
}

/// Always forks, never allows destruction
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultVersionPolicy;

impl VersionPolicy for DefaultVersionPolicy {}

/// Always forks and allows every destruction
///
/// # Example
/// ```
/// use versions_core::model::Record;
/// use versions_core::policy::{DestroyableVersionPolicy, VersionPolicy};
///
/// let policy = DestroyableVersionPolicy;
/// assert!(policy.can_destroy(&Record::new(), "versions").unwrap());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct DestroyableVersionPolicy;

impl VersionPolicy for DestroyableVersionPolicy {
    fn can_destroy(&self, _version: &Record, _table: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Owner-side validation
pub trait OwnerPolicy {
    fn validate(&self, _owner: &Record, _errors: &mut ErrorSet) {}
}

/// Owner without validations of its own
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopOwnerPolicy;

impl OwnerPolicy for NoopOwnerPolicy {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExErrorKind;

    #[test]
    fn test_default_policy_forks() {
        assert!(DefaultVersionPolicy.should_fork(&Record::new()));
        assert_eq!(DefaultVersionPolicy.previous_number(&Record::new()), None);
    }

    #[test]
    fn test_default_policy_rejects_destroy_with_configuration_error() {
        let err = DefaultVersionPolicy
            .can_destroy(&Record::new(), "versions")
            .unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::MissingOverride);
        assert!(err.kind().is_configuration());
        assert_eq!(err.table(), Some("versions"));
    }
}
