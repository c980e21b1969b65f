//! ODBC backend, the production path for SQL Server.

use std::ops::Range;

use odbc_api::buffers::{AnySliceMut, BufferDesc};
use odbc_api::{
    Bit, Connection, ConnectionOptions, Cursor, CursorRow, DataType as OdbcDataType, Nullable,
    ResultSetMetadata,
};
use tracing::{debug, info};

use crate::backend::{Backend, DriverResult};
use crate::config::ConnectionConfig;
use crate::error::{Error, Result};
use crate::table::{ColumnData, MaskedColumn, Table, TableBuilder};
use crate::value::{DataType, Value};

/// [`Backend`] over one ODBC connection with auto-commit switched off.
pub struct OdbcBackend {
    config: ConnectionConfig,
    conn: Connection<'static>,
}

impl OdbcBackend {
    pub fn connect(config: ConnectionConfig) -> Result<Self> {
        let connection_error = |source: odbc_api::Error| Error::Connection {
            server: config.server.clone(),
            port: config.port,
            database: config.database.clone(),
            source: Box::new(source),
        };

        let env = odbc_api::environment().map_err(connection_error)?;
        let conn = env
            .connect_with_connection_string(
                &config.connection_string(),
                ConnectionOptions::default(),
            )
            .map_err(connection_error)?;
        conn.set_autocommit(false).map_err(connection_error)?;

        info!(
            server = %config.server,
            port = config.port,
            database = %config.database,
            "connected"
        );
        Ok(Self { config, conn })
    }
}

impl Backend for OdbcBackend {
    fn query(&mut self, sql: &str) -> DriverResult<Table> {
        let Some(mut cursor) = self.conn.execute(sql, ())? else {
            return Ok(Table::new());
        };

        let num_cols = u16::try_from(cursor.num_result_cols()?)?;
        let mut columns = Vec::with_capacity(num_cols.into());
        for index in 1..=num_cols {
            let name = cursor.col_name(index)?;
            columns.push((name, table_type(cursor.col_data_type(index)?)));
        }
        let types: Vec<DataType> = columns.iter().map(|(_, t)| *t).collect();

        let mut builder = TableBuilder::new(columns)?;
        let mut buffers = CellBuffers::default();
        while let Some(mut row) = cursor.next_row()? {
            let mut cells = Vec::with_capacity(types.len());
            for (index, data_type) in (1..).zip(&types) {
                cells.push(buffers.read(
                    &mut row,
                    index,
                    *data_type,
                    self.config.prefer_unicode,
                )?);
            }
            builder.push_row(cells)?;
        }
        Ok(builder.finish())
    }

    fn execute(&mut self, sql: &str) -> DriverResult<()> {
        self.conn.execute(sql, ())?;
        Ok(())
    }

    fn begin(&mut self) -> DriverResult<()> {
        Ok(())
    }

    fn commit(&mut self) -> DriverResult<()> {
        self.conn.commit()?;
        Ok(())
    }

    fn rollback(&mut self) -> DriverResult<()> {
        self.conn.rollback()?;
        Ok(())
    }

    fn bulk_insert(&mut self, sql: &str, columns: &[MaskedColumn<'_>]) -> DriverResult<usize> {
        let num_rows = columns.first().map_or(0, MaskedColumn::len);
        if num_rows == 0 {
            return Ok(0);
        }
        let prefer_unicode = self.config.prefer_unicode;
        let descs: Vec<BufferDesc> = columns
            .iter()
            .map(|column| buffer_desc(column, prefer_unicode))
            .collect();
        let capacity = self.config.insert_batch_size.clamp(1, num_rows);

        let prepared = self.conn.prepare(sql)?;
        let mut inserter = prepared.into_column_inserter(capacity, descs)?;
        for batch in batches(num_rows, capacity) {
            inserter.set_num_rows(batch.len());
            for (index, column) in columns.iter().enumerate() {
                fill_column(inserter.column_mut(index), column, batch.clone())?;
            }
            inserter.execute()?;
            debug!(rows = batch.len(), "sent parameter batch");
        }
        Ok(num_rows)
    }

    fn qualify_table(&self, target: &str) -> String {
        if target.contains('.') {
            target.to_string()
        } else {
            format!("{}.{}.{}", self.config.database, self.config.schema, target)
        }
    }

    fn quote_identifier(&self, name: &str) -> String {
        format!("[{}]", name.replace(']', "]]"))
    }
}

/// Row ranges of at most `capacity` rows covering `0..num_rows`.
fn batches(num_rows: usize, capacity: usize) -> impl Iterator<Item = Range<usize>> {
    (0..num_rows)
        .step_by(capacity)
        .map(move |start| start..(start + capacity).min(num_rows))
}

fn table_type(data_type: OdbcDataType) -> DataType {
    match data_type {
        OdbcDataType::TinyInt
        | OdbcDataType::SmallInt
        | OdbcDataType::Integer
        | OdbcDataType::BigInt => DataType::Integer,
        OdbcDataType::Numeric { precision, scale: 0 }
        | OdbcDataType::Decimal { precision, scale: 0 }
            if precision <= 18 =>
        {
            DataType::Integer
        }
        OdbcDataType::Numeric { .. }
        | OdbcDataType::Decimal { .. }
        | OdbcDataType::Float { .. }
        | OdbcDataType::Real
        | OdbcDataType::Double => DataType::Real,
        OdbcDataType::Bit => DataType::Boolean,
        OdbcDataType::Binary { .. }
        | OdbcDataType::Varbinary { .. }
        | OdbcDataType::LongVarbinary { .. } => DataType::Blob,
        _ => DataType::Text,
    }
}

#[derive(Default)]
struct CellBuffers {
    narrow: Vec<u8>,
    wide: Vec<u16>,
}

impl CellBuffers {
    fn read(
        &mut self,
        row: &mut CursorRow<'_>,
        index: u16,
        data_type: DataType,
        prefer_unicode: bool,
    ) -> DriverResult<Value> {
        let value = match data_type {
            DataType::Integer => {
                let mut cell = Nullable::<i64>::null();
                row.get_data(index, &mut cell)?;
                cell.into_opt().into()
            }
            DataType::Real => {
                let mut cell = Nullable::<f64>::null();
                row.get_data(index, &mut cell)?;
                cell.into_opt().into()
            }
            DataType::Boolean => {
                let mut cell = Nullable::<Bit>::null();
                row.get_data(index, &mut cell)?;
                cell.into_opt().map(|bit| bit.as_bool()).into()
            }
            DataType::Blob => {
                if row.get_binary(index, &mut self.narrow)? {
                    Value::Blob(self.narrow.clone())
                } else {
                    Value::Null
                }
            }
            DataType::Text if prefer_unicode => {
                if row.get_wide_text(index, &mut self.wide)? {
                    Value::Text(String::from_utf16(&self.wide)?)
                } else {
                    Value::Null
                }
            }
            DataType::Text => {
                if row.get_text(index, &mut self.narrow)? {
                    Value::Text(String::from_utf8(self.narrow.clone())?)
                } else {
                    Value::Null
                }
            }
        };
        Ok(value)
    }
}

fn buffer_desc(column: &MaskedColumn<'_>, prefer_unicode: bool) -> BufferDesc {
    match column.data {
        ColumnData::Integer(_) => BufferDesc::I64 { nullable: true },
        ColumnData::Real(_) => BufferDesc::F64 { nullable: true },
        ColumnData::Boolean(_) => BufferDesc::Bit { nullable: true },
        ColumnData::Text(values) if prefer_unicode => BufferDesc::WText {
            max_str_len: longest(values.iter().flatten().map(|s| s.encode_utf16().count())),
        },
        ColumnData::Text(values) => BufferDesc::Text {
            max_str_len: longest(values.iter().flatten().map(String::len)),
        },
        ColumnData::Blob(values) => BufferDesc::Binary {
            length: longest(values.iter().flatten().map(Vec::len)),
        },
    }
}

fn longest(lengths: impl Iterator<Item = usize>) -> usize {
    lengths.max().unwrap_or(0).max(1)
}

fn fill_column(
    slice: AnySliceMut<'_>,
    column: &MaskedColumn<'_>,
    rows: Range<usize>,
) -> DriverResult<()> {
    let present = |row: usize| !column.is_null(row);
    match (slice, column.data) {
        (AnySliceMut::NullableI64(mut out), ColumnData::Integer(values)) => {
            for (i, row) in rows.enumerate() {
                out.set_cell(i, values[row].filter(|_| present(row)));
            }
        }
        (AnySliceMut::NullableF64(mut out), ColumnData::Real(values)) => {
            for (i, row) in rows.enumerate() {
                out.set_cell(i, values[row].filter(|_| present(row)));
            }
        }
        (AnySliceMut::NullableBit(mut out), ColumnData::Boolean(values)) => {
            for (i, row) in rows.enumerate() {
                out.set_cell(i, values[row].filter(|_| present(row)).map(Bit::from_bool));
            }
        }
        (AnySliceMut::WText(mut out), ColumnData::Text(values)) => {
            for (i, row) in rows.enumerate() {
                let wide: Option<Vec<u16>> = values[row]
                    .as_deref()
                    .filter(|_| present(row))
                    .map(|s| s.encode_utf16().collect());
                out.set_cell(i, wide.as_deref());
            }
        }
        (AnySliceMut::Text(mut out), ColumnData::Text(values)) => {
            for (i, row) in rows.enumerate() {
                let text = values[row].as_deref().filter(|_| present(row));
                out.set_cell(i, text.map(str::as_bytes));
            }
        }
        (AnySliceMut::Binary(mut out), ColumnData::Blob(values)) => {
            for (i, row) in rows.enumerate() {
                out.set_cell(i, values[row].as_deref().filter(|_| present(row)));
            }
        }
        (_, data) => {
            return Err(format!(
                "no insert buffer bound for {:?} column '{}'",
                data.data_type(),
                column.name
            )
            .into())
        }
    }
    Ok(())
}
