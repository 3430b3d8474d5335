//! Core types shared across the versions facilities
//!
//! This crate provides foundational types used by the error, logging,
//! storage and engine layers:
//!
//! - **Identifiers**: `RecordId`, the primary key of any persisted row
//! - **Schema constants**: Canonical field keys and event names

pub mod ids;
pub mod schema;

pub use ids::RecordId;
