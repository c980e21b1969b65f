use thiserror::Error;

/// Error reported by the underlying driver (ODBC or SQLite).
pub type DriverError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by a [`Session`](crate::Session).
///
/// Every variant keeps the driver error as its source; nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// The connection could not be opened at construction.
    #[error("connection to {server},{port} (database {database}) failed while initializing: {source}")]
    Connection {
        server: String,
        port: u16,
        database: String,
        #[source]
        source: DriverError,
    },

    /// An embedded database file could not be opened.
    #[error("failed to open database at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: DriverError,
    },

    /// The template was missing or failed to render.
    #[error("template error: {0}")]
    Template(#[from] minijinja::Error),

    /// A statement failed to execute.
    #[error("query failed: {source}\n{sql}")]
    Query {
        sql: String,
        #[source]
        source: DriverError,
    },

    /// A bulk load failed. The transaction was rolled back.
    #[error("write to {target} failed: {source}")]
    Write {
        target: String,
        #[source]
        source: DriverError,
    },

    #[error("invalid table: {0}")]
    InvalidTable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
