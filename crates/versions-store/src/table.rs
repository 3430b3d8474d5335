//! Table gateway
//!
//! Generic row access for any table with an integer `id` primary key.
//! Columns are introspected once at load time; attribute names are checked
//! against them before any SQL is built.

#![allow(clippy::result_large_err)]

use rusqlite::{params_from_iter, OptionalExtension, Row};
use versions_core::errors::VersionsError;
use versions_core::model::{Attributes, Record, Value};
use versions_core::{ExError, ExErrorKind};
use versions_core_types::RecordId;

use crate::errors::{from_rusqlite, Result};
use crate::schema::{quote_ident, table_columns, validate_identifier};
use crate::sql_value::{from_sql, to_sql};
use crate::tx::TxConnection;

pub const ID_COLUMN: &str = "id";
pub const CREATED_AT: &str = "created_at";
pub const UPDATED_AT: &str = "updated_at";

/// Sort direction for `find_where`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order<'a> {
    Asc(&'a str),
    Desc(&'a str),
}

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Vec<String>,
}

impl Table {
    /// Introspect a table
    ///
    /// # Errors
    ///
    /// `InvalidIdentifier` for a malformed name, `NotFound` if the table does
    /// not exist, `MissingColumn` if it has no `id` column.
    pub fn load(tx: &TxConnection, name: &str) -> Result<Self> {
        validate_identifier(name)?;
        let columns = table_columns(tx.connection(), name)?;
        if columns.is_empty() {
            return Err(ExError::new(ExErrorKind::NotFound)
                .with_op("table_load")
                .with_table(name)
                .with_message(format!("Table {} does not exist", name)));
        }
        let table = Self {
            name: name.to_string(),
            columns,
        };
        table.require_column(ID_COLUMN)?;
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// # Errors
    ///
    /// `MissingColumn` naming this table and the column.
    pub fn require_column(&self, column: &str) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(VersionsError::MissingColumn {
                table: self.name.clone(),
                column: column.to_string(),
            }
            .into())
        }
    }

    pub fn find(&self, tx: &TxConnection, id: RecordId) -> Result<Option<Record>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?",
            self.select_list(),
            quote_ident(&self.name),
            quote_ident(ID_COLUMN)
        );
        tx.connection()
            .query_row(&sql, [id.get()], |row| self.record_from_row(row))
            .optional()
            .map_err(from_rusqlite)
    }

    /// Like `find`, but a missing row is `NotFound`
    pub fn get(&self, tx: &TxConnection, id: RecordId) -> Result<Record> {
        self.find(tx, id)?.ok_or_else(|| {
            VersionsError::RecordNotFound {
                table: self.name.clone(),
                id,
            }
            .into()
        })
    }

    /// Rows whose `column` equals `value` (`Null` matches NULL)
    pub fn find_where(
        &self,
        tx: &TxConnection,
        column: &str,
        value: &Value,
        order: Option<Order<'_>>,
    ) -> Result<Vec<Record>> {
        self.check_column(column)?;
        let mut sql = format!(
            "SELECT {} FROM {} WHERE {} IS ?",
            self.select_list(),
            quote_ident(&self.name),
            quote_ident(column)
        );
        if let Some(order) = order {
            let (col, dir) = match order {
                Order::Asc(col) => (col, "ASC"),
                Order::Desc(col) => (col, "DESC"),
            };
            self.check_column(col)?;
            sql.push_str(&format!(
                " ORDER BY {} {dir}, {} {dir}",
                quote_ident(col),
                quote_ident(ID_COLUMN)
            ));
        }

        let mut stmt = tx.connection().prepare(&sql).map_err(from_rusqlite)?;
        let records = stmt
            .query_map([to_sql(value)], |row| self.record_from_row(row))
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        Ok(records)
    }

    pub fn first_where(
        &self,
        tx: &TxConnection,
        column: &str,
        value: &Value,
        order: Option<Order<'_>>,
    ) -> Result<Option<Record>> {
        Ok(self.find_where(tx, column, value, order)?.into_iter().next())
    }

    pub fn count(&self, tx: &TxConnection) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(&self.name));
        tx.connection()
            .query_row(&sql, [], |row| row.get(0))
            .map_err(from_rusqlite)
    }

    /// Rows whose `column` equals `value`, optionally leaving one id out
    pub fn count_where(
        &self,
        tx: &TxConnection,
        column: &str,
        value: &Value,
        excluding: Option<RecordId>,
    ) -> Result<i64> {
        self.check_column(column)?;
        let mut sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {} IS ?",
            quote_ident(&self.name),
            quote_ident(column)
        );
        let mut params = vec![to_sql(value)];
        if let Some(id) = excluding {
            sql.push_str(&format!(" AND {} != ?", quote_ident(ID_COLUMN)));
            params.push(rusqlite::types::Value::Integer(id.get()));
        }
        tx.connection()
            .query_row(&sql, params_from_iter(params), |row| row.get(0))
            .map_err(from_rusqlite)
    }

    /// Insert a new row from the record's attributes
    ///
    /// Timestamps are filled in when the table has them. On success the
    /// record is reloaded from the row (so column defaults are visible) and
    /// marked persisted with no pending changes.
    pub fn insert(&self, tx: &TxConnection, record: &mut Record) -> Result<RecordId> {
        self.check_attributes(record.attributes())?;

        let now = Value::Integer(chrono::Utc::now().timestamp_millis());
        let mut values = record.attributes().clone();
        if self.has_column(CREATED_AT) && record.get(CREATED_AT).is_null() {
            values.insert(CREATED_AT.to_string(), now.clone());
        }
        if self.has_column(UPDATED_AT) && record.get(UPDATED_AT).is_null() {
            values.insert(UPDATED_AT.to_string(), now);
        }

        let sql = if values.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", quote_ident(&self.name))
        } else {
            let names: Vec<String> = values.keys().map(|k| quote_ident(k)).collect();
            let marks = vec!["?"; values.len()].join(", ");
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote_ident(&self.name),
                names.join(", "),
                marks
            )
        };

        tx.connection()
            .execute(&sql, params_from_iter(values.values().map(to_sql)))
            .map_err(|e| from_rusqlite(e).with_table(self.name.clone()))?;
        let id = RecordId::new(tx.connection().last_insert_rowid());

        let stored = self.get(tx, id)?;
        record.mark_persisted(id);
        for (name, value) in stored.attributes() {
            record.write_raw(name, value.clone());
        }
        Ok(id)
    }

    /// Write the record's changed columns
    ///
    /// Returns `false` without touching the database if nothing changed.
    pub fn update(&self, tx: &TxConnection, record: &mut Record) -> Result<bool> {
        let id = self.persisted_id(record)?;
        if !record.is_changed() {
            return Ok(false);
        }

        let mut values = Attributes::new();
        for name in record.changed_attributes() {
            values.insert(name.to_string(), record.get(name).clone());
        }
        self.check_attributes(&values)?;
        if self.has_column(UPDATED_AT) && !values.contains_key(UPDATED_AT) {
            values.insert(
                UPDATED_AT.to_string(),
                Value::Integer(chrono::Utc::now().timestamp_millis()),
            );
        }

        let assignments: Vec<String> = values
            .keys()
            .map(|k| format!("{} = ?", quote_ident(k)))
            .collect();
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?",
            quote_ident(&self.name),
            assignments.join(", "),
            quote_ident(ID_COLUMN)
        );
        let mut params: Vec<rusqlite::types::Value> = values.values().map(to_sql).collect();
        params.push(rusqlite::types::Value::Integer(id.get()));

        let affected = tx
            .connection()
            .execute(&sql, params_from_iter(params))
            .map_err(|e| {
                from_rusqlite(e)
                    .with_table(self.name.clone())
                    .with_record_id(id)
            })?;
        if affected == 0 {
            return Err(VersionsError::RecordNotFound {
                table: self.name.clone(),
                id,
            }
            .into());
        }

        for (name, value) in values {
            record.write_raw(&name, value);
        }
        record.clear_changes();
        Ok(true)
    }

    /// Delete a row; `false` if it did not exist
    pub fn delete(&self, tx: &TxConnection, id: RecordId) -> Result<bool> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?",
            quote_ident(&self.name),
            quote_ident(ID_COLUMN)
        );
        let affected = tx
            .connection()
            .execute(&sql, [id.get()])
            .map_err(|e| from_rusqlite(e).with_table(self.name.clone()).with_record_id(id))?;
        Ok(affected > 0)
    }

    /// Internal single-column write
    ///
    /// Skips timestamps, hooks, validation and change tracking. Callers
    /// mirror the value into their in-memory record with `write_raw`.
    pub fn update_column(
        &self,
        tx: &TxConnection,
        id: RecordId,
        column: &str,
        value: &Value,
    ) -> Result<()> {
        self.check_column(column)?;
        let sql = format!(
            "UPDATE {} SET {} = ? WHERE {} = ?",
            quote_ident(&self.name),
            quote_ident(column),
            quote_ident(ID_COLUMN)
        );
        let affected = tx
            .connection()
            .execute(
                &sql,
                params_from_iter([to_sql(value), rusqlite::types::Value::Integer(id.get())]),
            )
            .map_err(|e| from_rusqlite(e).with_table(self.name.clone()).with_record_id(id))?;
        if affected == 0 {
            return Err(VersionsError::RecordNotFound {
                table: self.name.clone(),
                id,
            }
            .into());
        }
        Ok(())
    }

    fn persisted_id(&self, record: &Record) -> Result<RecordId> {
        match record.id() {
            Some(id) if !record.is_new_record() => Ok(id),
            _ => Err(VersionsError::Internal {
                message: format!("cannot update an unsaved {} row", self.name),
            }
            .into()),
        }
    }

    fn check_column(&self, column: &str) -> Result<()> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(VersionsError::UnknownAttribute {
                table: self.name.clone(),
                attribute: column.to_string(),
            }
            .into())
        }
    }

    fn check_attributes(&self, attributes: &Attributes) -> Result<()> {
        for name in attributes.keys() {
            if name == ID_COLUMN {
                return Err(VersionsError::UnknownAttribute {
                    table: self.name.clone(),
                    attribute: name.clone(),
                }
                .into());
            }
            self.check_column(name)?;
        }
        Ok(())
    }

    fn select_list(&self) -> String {
        self.columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn record_from_row(&self, row: &Row<'_>) -> rusqlite::Result<Record> {
        let mut id = None;
        let mut attributes = Attributes::new();
        for (idx, column) in self.columns.iter().enumerate() {
            let value = from_sql(row.get_ref(idx)?);
            if column == ID_COLUMN {
                id = value.as_i64();
            } else {
                attributes.insert(column.clone(), value);
            }
        }
        let id = id.ok_or_else(|| {
            rusqlite::Error::InvalidColumnType(0, ID_COLUMN.to_string(), rusqlite::types::Type::Null)
        })?;
        Ok(Record::from_row(RecordId::new(id), attributes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use versions_core::attrs;

    fn setup() -> (TxConnection, Table) {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE notes (
                id INTEGER PRIMARY KEY,
                title TEXT,
                kind TEXT DEFAULT 'plain',
                created_at INTEGER,
                updated_at INTEGER
            );",
        )
        .unwrap();
        let tx = TxConnection::new(conn);
        let table = Table::load(&tx, "notes").unwrap();
        (tx, table)
    }

    #[test]
    fn test_load_rejects_missing_table() {
        let (tx, _) = setup();
        let err = Table::load(&tx, "nothing").unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
    }

    #[test]
    fn test_insert_fills_defaults_and_timestamps() {
        let (tx, table) = setup();
        let mut record = Record::new();
        record.assign(attrs! { "title" => "A" });

        let id = table.insert(&tx, &mut record).unwrap();

        assert_eq!(record.id(), Some(id));
        assert!(!record.is_new_record());
        assert!(!record.is_changed());
        assert_eq!(record.get("kind"), &Value::from("plain"));
        assert!(record.get(CREATED_AT).as_i64().is_some());
    }

    #[test]
    fn test_insert_rejects_unknown_attribute() {
        let (tx, table) = setup();
        let mut record = Record::new();
        record.set("colour", "red");
        let err = table.insert(&tx, &mut record).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
        assert_eq!(table.count(&tx).unwrap(), 0);
    }

    #[test]
    fn test_update_writes_changes_only() {
        let (tx, table) = setup();
        let mut record = Record::new();
        record.assign(attrs! { "title" => "A" });
        let id = table.insert(&tx, &mut record).unwrap();

        assert!(!table.update(&tx, &mut record).unwrap());

        record.set("title", "B");
        assert!(table.update(&tx, &mut record).unwrap());
        assert!(!record.is_changed());
        assert_eq!(table.get(&tx, id).unwrap().get("title"), &Value::from("B"));
    }

    #[test]
    fn test_find_where_orders_and_matches_null() {
        let (tx, table) = setup();
        for title in ["b", "a", "c"] {
            let mut record = Record::new();
            record.set("title", title);
            table.insert(&tx, &mut record).unwrap();
        }
        let mut untitled = Record::new();
        table.insert(&tx, &mut untitled).unwrap();

        let titles: Vec<String> = table
            .find_where(&tx, "kind", &Value::from("plain"), Some(Order::Desc("title")))
            .unwrap()
            .iter()
            .filter_map(|r| r.get("title").as_str().map(String::from))
            .collect();
        assert_eq!(titles, vec!["c", "b", "a"]);

        let nulls = table.find_where(&tx, "title", &Value::Null, None).unwrap();
        assert_eq!(nulls.len(), 1);
    }

    #[test]
    fn test_count_where_excluding() {
        let (tx, table) = setup();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let mut record = Record::new();
            record.set("title", "same");
            ids.push(table.insert(&tx, &mut record).unwrap());
        }
        let same = Value::from("same");
        assert_eq!(table.count_where(&tx, "title", &same, None).unwrap(), 3);
        assert_eq!(table.count_where(&tx, "title", &same, Some(ids[0])).unwrap(), 2);
    }

    #[test]
    fn test_update_column_skips_timestamps() {
        let (tx, table) = setup();
        let mut record = Record::new();
        record.set("title", "A");
        let id = table.insert(&tx, &mut record).unwrap();
        let stamped = record.get(UPDATED_AT).clone();

        table.update_column(&tx, id, UPDATED_AT, &Value::Integer(1)).unwrap();
        table.update_column(&tx, id, "title", &Value::from("B")).unwrap();

        let stored = table.get(&tx, id).unwrap();
        assert_eq!(stored.get("title"), &Value::from("B"));
        assert_eq!(stored.get(UPDATED_AT), &Value::Integer(1));
        assert_ne!(stamped, Value::Integer(1));
    }

    #[test]
    fn test_delete() {
        let (tx, table) = setup();
        let mut record = Record::new();
        let id = table.insert(&tx, &mut record).unwrap();
        assert!(table.delete(&tx, id).unwrap());
        assert!(!table.delete(&tx, id).unwrap());
        let err = table.get(&tx, id).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::NotFound);
    }
}
