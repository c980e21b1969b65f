use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::backend::Backend;
use crate::error::{DriverError, Error, Result};
use crate::sqlite::SqliteBackend;
use crate::table::Table;
use crate::template::render_template;

pub type SqliteSession = Session<SqliteBackend>;

#[cfg(feature = "odbc")]
pub type OdbcSession = Session<crate::odbc::OdbcBackend>;

/// Outcome of a [`Session::bulk_write`].
#[derive(Debug, Clone, PartialEq)]
pub struct WriteSummary {
    /// Qualified name of the table written to
    pub target: String,
    pub rows: usize,
    pub truncated: bool,
    pub elapsed: Duration,
}

/// One open database connection and the operations run over it.
///
/// Every call blocks until the driver returns. A session is not meant to be
/// shared between threads; open one per thread instead.
pub struct Session<B: Backend> {
    backend: B,
}

impl<B: Backend> Session<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }


    /// Render `template_file` from `template_dir` with `context` and return
    /// the query's result set.
    pub fn query_to_table<C: Serialize>(
        &mut self,
        template_file: &str,
        template_dir: impl AsRef<Path>,
        context: C,
    ) -> Result<Table> {
        let sql = render_template(template_file, template_dir, context)?;
        self.raw_query(&sql)
    }

    /// Render a template and execute it for effect, committing on success.
    ///
    /// A failed statement is rolled back before the error is returned.
    pub fn execute_template<C: Serialize>(
        &mut self,
        template_file: &str,
        template_dir: impl AsRef<Path>,
        context: C,
    ) -> Result<()> {
        let sql = render_template(template_file, template_dir, context)?;
        self.execute(&sql)
    }

    /// Execute literal SQL for effect, committing on success.
    #[instrument(skip_all)]
    pub fn execute(&mut self, sql: &str) -> Result<()> {
        info!(sql = %sql, "running statement");
        let result = self
            .backend
            .begin()
            .and_then(|_| self.backend.execute(sql))
            .and_then(|_| self.backend.commit());
        match result {
            Ok(()) => {
                debug!("statement committed");
                Ok(())
            }
            Err(source) => {
                self.rollback_after_failure();
                Err(Error::Query {
                    sql: sql.to_string(),
                    source,
                })
            }
        }
    }

    /// Execute literal SQL and return its result set.
    #[instrument(skip_all)]
    pub fn raw_query(&mut self, sql: &str) -> Result<Table> {
        info!(sql = %sql, "running query");
        let table = self.backend.query(sql).map_err(|source| Error::Query {
            sql: sql.to_string(),
            source,
        })?;
        debug!(rows = table.num_rows(), columns = table.num_columns(), "query returned");
        Ok(table)
    }

    /// Load every row of `table` into `target`, deleting its existing rows
    /// first when `truncate` is set.
    ///
    /// The delete is committed on its own. The insert is committed as one
    /// unit and rolled back on any failure. Empty input writes nothing.
    #[instrument(skip(self, table), fields(rows = table.num_rows()))]
    pub fn bulk_write(&mut self, table: &Table, target: &str, truncate: bool) -> Result<WriteSummary> {
        let start = Instant::now();
        let qualified = self.backend.qualify_table(target);

        if truncate {
            info!(table = %qualified, "truncating table before load");
            let delete = format!("DELETE FROM {}", qualified);
            self.in_transaction(|backend| backend.execute(&delete))
                .map_err(|source| Error::Write {
                    target: qualified.clone(),
                    source,
                })?;
        } else {
            debug!(table = %qualified, "loading table without truncation");
        }

        let rows = if table.is_empty() {
            0
        } else {
            let sql = self.insert_statement(table, &qualified);
            debug!(sql = %sql, "bulk insert");
            let columns = table.masked_columns();
            self.in_transaction(|backend| backend.bulk_insert(&sql, &columns))
                .map_err(|source| Error::Write {
                    target: qualified.clone(),
                    source,
                })?
        };

        let elapsed = start.elapsed();
        info!(
            table = %qualified,
            rows,
            elapsed_ms = elapsed.as_millis() as u64,
            "load complete"
        );
        Ok(WriteSummary {
            target: qualified,
            rows,
            truncated: truncate,
            elapsed,
        })
    }

    fn insert_statement(&self, table: &Table, qualified: &str) -> String {
        let columns = table
            .column_names()
            .iter()
            .map(|name| self.backend.quote_identifier(name))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; table.num_columns()].join(", ");
        format!("INSERT INTO {} ({}) VALUES ({})", qualified, columns, placeholders)
    }

    fn in_transaction<T>(
        &mut self,
        work: impl FnOnce(&mut B) -> std::result::Result<T, DriverError>,
    ) -> std::result::Result<T, DriverError> {
        let result = self
            .backend
            .begin()
            .and_then(|_| work(&mut self.backend))
            .and_then(|value| self.backend.commit().map(|_| value));
        if result.is_err() {
            self.rollback_after_failure();
        }
        result
    }

    fn rollback_after_failure(&mut self) {
        match self.backend.rollback() {
            Ok(()) => warn!("rolled back after failure"),
            Err(e) => warn!(error = %e, "rollback after failure also failed"),
        }
    }
}

impl Session<SqliteBackend> {
    /// Session over an SQLite database file, created if missing.
    pub fn open_sqlite(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(SqliteBackend::open(path)?))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(SqliteBackend::open_in_memory()?))
    }
}

#[cfg(feature = "odbc")]
impl Session<crate::odbc::OdbcBackend> {
    /// Open an ODBC connection. Failures carry server, port and database.
    pub fn connect(config: crate::config::ConnectionConfig) -> Result<Self> {
        Ok(Self::new(crate::odbc::OdbcBackend::connect(config)?))
    }
}
