//! Embedded SQLite backend.

use std::path::Path;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use tracing::debug;

use crate::backend::{Backend, DriverResult};
use crate::error::{Error, Result};
use crate::table::{MaskedColumn, Table};
use crate::value::Value;

/// [`Backend`] over a rusqlite connection.
///
/// SQLite runs in auto-commit mode; `begin` opens an explicit transaction so
/// that commit and rollback behave as they do over ODBC.
pub struct SqliteBackend {
    conn: Connection,
}

impl SqliteBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| Error::Open {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::Open {
            path: ":memory:".to_string(),
            source: Box::new(e),
        })?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl Backend for SqliteBackend {
    fn query(&mut self, sql: &str) -> DriverResult<Table> {
        let mut stmt = self.conn.prepare(sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = names.len();
        let mut rows = stmt.query([])?;
        let mut values = Vec::new();
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for index in 0..width {
                cells.push(from_sql(row.get_ref(index)?)?);
            }
            values.push(cells);
        }
        Ok(Table::from_rows(names, values)?)
    }

    fn execute(&mut self, sql: &str) -> DriverResult<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    fn begin(&mut self) -> DriverResult<()> {
        if self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn commit(&mut self) -> DriverResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> DriverResult<()> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn bulk_insert(&mut self, sql: &str, columns: &[MaskedColumn<'_>]) -> DriverResult<usize> {
        let num_rows = columns.first().map_or(0, MaskedColumn::len);
        let mut stmt = self.conn.prepare(sql)?;
        for row in 0..num_rows {
            let params = columns.iter().map(|column| to_sql(column.value(row)));
            stmt.execute(params_from_iter(params))?;
        }
        debug!(rows = num_rows, "sqlite bulk insert");
        Ok(num_rows)
    }

    fn qualify_table(&self, target: &str) -> String {
        target.to_string()
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

fn from_sql(value: ValueRef<'_>) -> DriverResult<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(v) => Value::Text(std::str::from_utf8(v)?.to_string()),
        ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    })
}

fn to_sql(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(v),
        Value::Real(v) => SqlValue::Real(v),
        Value::Text(v) => SqlValue::Text(v),
        Value::Blob(v) => SqlValue::Blob(v),
        Value::Boolean(v) => SqlValue::Integer(v.into()),
    }
}
