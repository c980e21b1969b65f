//! SQL Server sessions over ODBC, with templated SQL and columnar bulk loads.
//!
//! # Intention
//!
//! - Open one connection from plain credentials and keep it for the session.
//! - Render SQL from Jinja template files and run it as a query or for effect.
//! - Load in-memory tables into database tables with native NULLs.
//!
//! # Architectural Boundaries
//!
//! - Wire protocol, statement preparation and bulk binding belong to the driver.
//! - Template syntax belongs to minijinja.
//! - The `odbc` feature enables the ODBC backend; SQLite is always available.

pub mod backend;
pub mod config;
pub mod error;
#[cfg(feature = "odbc")]
pub mod odbc;
pub mod session;
pub mod sqlite;
pub mod table;
pub mod template;
pub mod value;

pub use backend::Backend;
pub use config::ConnectionConfig;
pub use error::{Error, Result};
#[cfg(feature = "odbc")]
pub use odbc::OdbcBackend;
#[cfg(feature = "odbc")]
pub use session::OdbcSession;
pub use session::{Session, SqliteSession, WriteSummary};
pub use sqlite::SqliteBackend;
pub use table::{Column, ColumnData, MaskedColumn, Table, TableBuilder};
pub use template::{render_template, TemplateContext, TemplateRenderer};
pub use value::{DataType, Value};
