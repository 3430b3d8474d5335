//! Per-owner version number high-water marks
//!
//! Destroying the newest version must not make its number available again,
//! so the highest number ever issued for an owner is kept here.

#![allow(clippy::result_large_err)]

use rusqlite::OptionalExtension;
use versions_core_types::RecordId;

use crate::errors::{from_rusqlite, Result};
use crate::tx::TxConnection;

pub const LINEAGES_TABLE: &str = "version_lineages";

/// Highest number issued for the owner, if any was recorded
pub fn last_number(
    tx: &TxConnection,
    owner_table: &str,
    owner_id: RecordId,
) -> Result<Option<i64>> {
    tx.connection()
        .query_row(
            "SELECT last_number FROM version_lineages WHERE owner_table = ?1 AND owner_id = ?2",
            rusqlite::params![owner_table, owner_id.get()],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)
}

/// Raise the owner's high-water mark to `number` (never lowers it)
pub fn record_number(
    tx: &TxConnection,
    owner_table: &str,
    owner_id: RecordId,
    number: i64,
) -> Result<()> {
    tx.connection()
        .execute(
            "INSERT INTO version_lineages (owner_table, owner_id, last_number) VALUES (?1, ?2, ?3)
             ON CONFLICT (owner_table, owner_id)
             DO UPDATE SET last_number = MAX(last_number, excluded.last_number)",
            rusqlite::params![owner_table, owner_id.get(), number],
        )
        .map_err(from_rusqlite)?;
    Ok(())
}

/// Drop the owner's lineage entry (owner destroyed)
pub fn forget(tx: &TxConnection, owner_table: &str, owner_id: RecordId) -> Result<()> {
    tx.connection()
        .execute(
            "DELETE FROM version_lineages WHERE owner_table = ?1 AND owner_id = ?2",
            rusqlite::params![owner_table, owner_id.get()],
        )
        .map_err(from_rusqlite)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::apply_migrations;
    use rusqlite::Connection;

    fn tx() -> TxConnection {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        TxConnection::new(conn)
    }

    #[test]
    fn test_record_number_only_raises() {
        let tx = tx();
        let owner = RecordId::new(1);
        assert_eq!(last_number(&tx, "pages", owner).unwrap(), None);

        record_number(&tx, "pages", owner, 3).unwrap();
        record_number(&tx, "pages", owner, 2).unwrap();
        assert_eq!(last_number(&tx, "pages", owner).unwrap(), Some(3));

        record_number(&tx, "pages", owner, 4).unwrap();
        assert_eq!(last_number(&tx, "pages", owner).unwrap(), Some(4));
    }

    #[test]
    fn test_lineages_are_per_owner_table() {
        let tx = tx();
        let owner = RecordId::new(1);
        record_number(&tx, "pages", owner, 5).unwrap();
        assert_eq!(last_number(&tx, "books", owner).unwrap(), None);

        forget(&tx, "pages", owner).unwrap();
        assert_eq!(last_number(&tx, "pages", owner).unwrap(), None);
    }
}
