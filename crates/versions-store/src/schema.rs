//! Schema introspection
//!
//! Table and column names end up inside SQL text, so every name is checked
//! to be a plain identifier before it is used.

#![allow(clippy::result_large_err)]

use rusqlite::Connection;
use versions_core::errors::VersionsError;

use crate::errors::{from_rusqlite, Result};

/// Accept `[A-Za-z_][A-Za-z0-9_]*`
pub fn validate_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(VersionsError::InvalidIdentifier {
            name: name.to_string(),
        }
        .into())
    }
}

/// Quote a validated identifier
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

/// Column names of a table in declaration order; empty if the table is absent
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    validate_identifier(table)?;
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))
        .map_err(from_rusqlite)?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use versions_core::ExErrorKind;

    #[test]
    fn test_validate_identifier() {
        assert!(validate_identifier("page_versions").is_ok());
        assert!(validate_identifier("_x1").is_ok());

        for bad in ["", "1abc", "pages;", "a b", "x\"y"] {
            let err = validate_identifier(bad).unwrap_err();
            assert_eq!(err.kind(), ExErrorKind::InvalidIdentifier, "{bad:?}");
        }
    }

    #[test]
    fn test_table_columns() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE pages (id INTEGER PRIMARY KEY, name TEXT);")
            .unwrap();
        assert_eq!(table_columns(&conn, "pages").unwrap(), vec!["id", "name"]);
        assert!(table_columns(&conn, "missing").unwrap().is_empty());
    }
}
