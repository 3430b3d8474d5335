//! Row identifiers
//!
//! Every table managed by the versions stack uses an integer primary key
//! named `id`. `RecordId` wraps it so owner, version and attachment ids are
//! never confused with version numbers or counts.

use serde::{Deserialize, Serialize};

/// Primary key of a persisted row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    /// Wrap a raw rowid
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Get the raw rowid
    pub fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_display() {
        let id = RecordId::new(42);
        assert_eq!(format!("{}", id), "42");
        assert_eq!(id.get(), 42);
    }

    #[test]
    fn test_record_id_parse() {
        let id: RecordId = " 7 ".parse().unwrap();
        assert_eq!(id, RecordId::new(7));
        assert!("seven".parse::<RecordId>().is_err());
    }

    #[test]
    fn test_serialization_is_transparent() {
        let id = RecordId::new(3);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "3");
        let back: RecordId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
