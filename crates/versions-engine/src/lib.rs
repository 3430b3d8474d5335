//! Versions Engine - clone-on-change versioning over the store
//!
//! - `auto`: the Version Clone Engine (`Versioned`)
//! - `multi`: the Current-Version Facade (`HasMultiple`, `Owner`)
//! - `destroy`: the nested destroy flag
//! - version-side attachment handling shared by both

mod attachment;
pub mod auto;
pub mod destroy;
pub mod multi;
pub mod version;

pub use auto::{Versioned, VersionedBuilder, BASE};
pub use multi::{HasMultiple, HasMultipleBuilder, Owner};
pub use version::Version;
