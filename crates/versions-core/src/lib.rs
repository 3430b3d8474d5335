//! Versions Core - attribute model, policies, errors and logging
//!
//! This crate provides the building blocks shared by the store and the
//! versioning engine:
//! - Change-tracked `Record`s holding typed `Value`s
//! - `ErrorSet` for validation and persistence failures
//! - `VersionPolicy` / `OwnerPolicy` decision hooks
//! - The canonical `ExError` facility and structured logging macros

pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod policy;

pub use errors::{ExError, ExErrorKind, Result, VersionsError};
pub use model::{Attributes, ErrorSet, Record, Value};
pub use policy::{
    DefaultVersionPolicy, DestroyableVersionPolicy, NoopOwnerPolicy, OwnerPolicy, VersionPolicy,
};
