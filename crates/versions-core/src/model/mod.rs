//! Attribute model shared by owners, versions and attachments
//!
//! A row is handled as a change-tracked bag of typed column values. The
//! versioning engine decides fork-or-update from this change tracking.

pub mod error_set;
pub mod record;
pub mod value;

pub use error_set::ErrorSet;
pub use record::Record;
pub use value::Value;

/// Column name to value map used for mass assignment
pub type Attributes = std::collections::BTreeMap<String, Value>;

/// Build an `Attributes` map
///
/// ```
/// use versions_core::attrs;
///
/// let attrs = attrs! { "title" => "First", "text" => "body" };
/// assert_eq!(attrs.len(), 2);
/// ```
#[macro_export]
macro_rules! attrs {
    () => {
        $crate::model::Attributes::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::model::Attributes::new();
        $(
            map.insert(($key).to_string(), $crate::model::Value::from($value));
        )+
        map
    }};
}
