//! Destroy/Cascade Policy: the nested destroy flag
//!
//! A version payload may carry `__destroy` (or `:__destroy`) to ask for the
//! version to be removed instead of updated. The owner-side cascade lives in
//! `multi`, the `can_destroy` gate in `auto`.

use versions_core::model::Value;

pub const DESTROY_KEY: &str = "__destroy";
const DESTROY_SYMBOL_KEY: &str = ":__destroy";

pub fn is_destroy_key(key: &str) -> bool {
    key == DESTROY_KEY || key == DESTROY_SYMBOL_KEY
}

/// Whether an assigned flag value requests destruction
pub fn requests_destroy(value: &Value) -> bool {
    value.is_truthy()
}
