use crate::error::DriverError;
use crate::table::{MaskedColumn, Table};

pub type DriverResult<T> = std::result::Result<T, DriverError>;

/// A live database connection driven by a [`Session`](crate::Session).
///
/// Statements and cursors are acquired inside each call and released before
/// it returns, on success and on error alike.
pub trait Backend {
    /// Execute a query and collect its result set.
    fn query(&mut self, sql: &str) -> DriverResult<Table>;

    /// Execute a statement (or batch) for effect, discarding any result set.
    fn execute(&mut self, sql: &str) -> DriverResult<()>;

    /// Start a unit of work that ends with [`commit`](Self::commit) or
    /// [`rollback`](Self::rollback).
    fn begin(&mut self) -> DriverResult<()>;

    fn commit(&mut self) -> DriverResult<()>;

    fn rollback(&mut self) -> DriverResult<()>;

    /// Run the parameterised `sql` once per row of `columns`, binding values
    /// column-wise and masked cells as NULL. Returns the rows sent.
    fn bulk_insert(&mut self, sql: &str, columns: &[MaskedColumn<'_>]) -> DriverResult<usize>;

    /// Fully qualified name for a bulk-load target.
    fn qualify_table(&self, target: &str) -> String;

    fn quote_identifier(&self, name: &str) -> String;
}
