//! In-memory tables returned by queries and consumed by bulk loads.

use crate::error::{Error, Result};
use crate::value::{DataType, Value};

/// Typed cells of one column. `None` is a SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Integer(Vec<Option<i64>>),
    Real(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
    Blob(Vec<Option<Vec<u8>>>),
    Boolean(Vec<Option<bool>>),
}

impl ColumnData {
    pub fn empty(data_type: DataType) -> Self {
        match data_type {
            DataType::Integer => ColumnData::Integer(Vec::new()),
            DataType::Real => ColumnData::Real(Vec::new()),
            DataType::Text => ColumnData::Text(Vec::new()),
            DataType::Blob => ColumnData::Blob(Vec::new()),
            DataType::Boolean => ColumnData::Boolean(Vec::new()),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ColumnData::Integer(_) => DataType::Integer,
            ColumnData::Real(_) => DataType::Real,
            ColumnData::Text(_) => DataType::Text,
            ColumnData::Blob(_) => DataType::Blob,
            ColumnData::Boolean(_) => DataType::Boolean,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ColumnData::Integer(v) => v.len(),
            ColumnData::Real(v) => v.len(),
            ColumnData::Text(v) => v.len(),
            ColumnData::Blob(v) => v.len(),
            ColumnData::Boolean(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a cell. Integers widen into real columns; anything else must match.
    pub fn push(&mut self, value: Value) -> Result<()> {
        match (self, value) {
            (ColumnData::Integer(v), Value::Null) => v.push(None),
            (ColumnData::Real(v), Value::Null) => v.push(None),
            (ColumnData::Text(v), Value::Null) => v.push(None),
            (ColumnData::Blob(v), Value::Null) => v.push(None),
            (ColumnData::Boolean(v), Value::Null) => v.push(None),
            (ColumnData::Integer(v), Value::Integer(x)) => v.push(Some(x)),
            (ColumnData::Real(v), Value::Real(x)) => v.push(Some(x)),
            (ColumnData::Real(v), Value::Integer(x)) => v.push(Some(x as f64)),
            (ColumnData::Text(v), Value::Text(x)) => v.push(Some(x)),
            (ColumnData::Blob(v), Value::Blob(x)) => v.push(Some(x)),
            (ColumnData::Boolean(v), Value::Boolean(x)) => v.push(Some(x)),
            (column, value) => {
                return Err(Error::InvalidTable(format!(
                    "cannot store {:?} in a {:?} column",
                    value,
                    column.data_type()
                )))
            }
        }
        Ok(())
    }

    /// Cell at `index` as a [`Value`]. Out of range reads as `Null`.
    pub fn get(&self, index: usize) -> Value {
        match self {
            ColumnData::Integer(v) => v.get(index).copied().flatten().into(),
            ColumnData::Real(v) => v.get(index).copied().flatten().into(),
            ColumnData::Text(v) => v.get(index).cloned().flatten().into(),
            ColumnData::Blob(v) => v.get(index).cloned().flatten().into(),
            ColumnData::Boolean(v) => v.get(index).copied().flatten().into(),
        }
    }

    /// Null mask: `true` where the cell is missing. NaN counts as missing.
    pub fn null_mask(&self) -> Vec<bool> {
        match self {
            ColumnData::Integer(v) => v.iter().map(Option::is_none).collect(),
            ColumnData::Real(v) => v
                .iter()
                .map(|cell| cell.map_or(true, f64::is_nan))
                .collect(),
            ColumnData::Text(v) => v.iter().map(Option::is_none).collect(),
            ColumnData::Blob(v) => v.iter().map(Option::is_none).collect(),
            ColumnData::Boolean(v) => v.iter().map(Option::is_none).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// Rows by named columns, stored column-wise.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column. It must be as long as the existing ones and have a fresh name.
    pub fn with_column(mut self, name: impl Into<String>, data: ColumnData) -> Result<Self> {
        self.push_column(name, data)?;
        Ok(self)
    }

    pub fn push_column(&mut self, name: impl Into<String>, data: ColumnData) -> Result<()> {
        let name = name.into();
        if self.columns.iter().any(|c| c.name == name) {
            return Err(Error::InvalidTable(format!("duplicate column '{}'", name)));
        }
        if let Some(first) = self.columns.first() {
            if first.data.len() != data.len() {
                return Err(Error::InvalidTable(format!(
                    "column '{}' has {} rows, expected {}",
                    name,
                    data.len(),
                    first.data.len()
                )));
            }
        }
        self.columns.push(Column { name, data });
        Ok(())
    }

    /// Build from untyped rows, inferring each column's type from its cells.
    /// Integer and real cells mix into a real column. All-null columns, and
    /// columns whose cells disagree otherwise, become text with every cell
    /// rendered as text.
    pub fn from_rows(names: Vec<String>, rows: Vec<Vec<Value>>) -> Result<Self> {
        let types = (0..names.len())
            .map(|index| infer_type(rows.iter().filter_map(|row| row.get(index))))
            .collect::<Vec<_>>();
        let mut builder = TableBuilder::new(names.into_iter().zip(types.iter().copied()).collect())?;
        for row in rows {
            let row = row
                .into_iter()
                .zip(types.iter().chain(std::iter::repeat(&DataType::Text)))
                .map(|(cell, data_type)| match data_type {
                    DataType::Text => text_cell(cell),
                    _ => cell,
                })
                .collect();
            builder.push_row(row)?;
        }
        Ok(builder.finish())
    }

    pub fn num_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.data.len())
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.columns.iter().find(|c| c.name == name).map(|c| &c.data)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<Value> {
        if row >= self.num_rows() {
            return None;
        }
        self.column(column).map(|data| data.get(row))
    }

    pub fn row(&self, index: usize) -> Option<Vec<Value>> {
        if index >= self.num_rows() {
            return None;
        }
        Some(self.columns.iter().map(|c| c.data.get(index)).collect())
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<Value>> + '_ {
        (0..self.num_rows()).map(|index| self.columns.iter().map(|c| c.data.get(index)).collect())
    }

    /// Columns paired with explicit null masks, ready for a columnar insert.
    pub fn masked_columns(&self) -> Vec<MaskedColumn<'_>> {
        self.columns
            .iter()
            .map(|c| MaskedColumn {
                name: &c.name,
                data: &c.data,
                nulls: c.data.null_mask(),
            })
            .collect()
    }
}

fn infer_type<'a>(cells: impl Iterator<Item = &'a Value>) -> DataType {
    let mut inferred = None;
    for cell in cells {
        match (inferred, cell.data_type()) {
            (_, None) => {}
            (None, Some(t)) => inferred = Some(t),
            (Some(current), Some(t)) if current == t => {}
            (Some(DataType::Integer), Some(DataType::Real)) => inferred = Some(DataType::Real),
            (Some(DataType::Real), Some(DataType::Integer)) => {}
            (Some(_), Some(_)) => return DataType::Text,
        }
    }
    inferred.unwrap_or(DataType::Text)
}

fn text_cell(value: Value) -> Value {
    match value {
        Value::Integer(v) => Value::Text(v.to_string()),
        Value::Real(v) => Value::Text(v.to_string()),
        Value::Boolean(v) => Value::Text(v.to_string()),
        Value::Blob(bytes) => {
            let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
            Value::Text(format!("0x{}", hex))
        }
        other => other,
    }
}

/// Row-wise construction of a [`Table`] with known column types.
#[derive(Debug)]
pub struct TableBuilder {
    table: Table,
}

impl TableBuilder {
    pub fn new(columns: Vec<(String, DataType)>) -> Result<Self> {
        let mut table = Table::new();
        for (name, data_type) in columns {
            table.push_column(name, ColumnData::empty(data_type))?;
        }
        Ok(Self { table })
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.table.columns.len() {
            return Err(Error::InvalidTable(format!(
                "row has {} cells, expected {}",
                row.len(),
                self.table.columns.len()
            )));
        }
        for (column, value) in self.table.columns.iter_mut().zip(row) {
            column.data.push(value)?;
        }
        Ok(())
    }

    pub fn finish(self) -> Table {
        self.table
    }
}

/// A column borrowed from a [`Table`] together with its null mask.
#[derive(Debug)]
pub struct MaskedColumn<'a> {
    pub name: &'a str,
    pub data: &'a ColumnData,
    pub nulls: Vec<bool>,
}

impl MaskedColumn<'_> {
    pub fn len(&self) -> usize {
        self.nulls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nulls.is_empty()
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.nulls.get(index).copied().unwrap_or(true)
    }

    /// Cell at `index`, `Null` where masked.
    pub fn value(&self, index: usize) -> Value {
        if self.is_null(index) {
            Value::Null
        } else {
            self.data.get(index)
        }
    }
}
