use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 1433;
pub const DEFAULT_SCHEMA: &str = "dbo";
pub const DEFAULT_INSERT_BATCH_SIZE: usize = 1000;

/// Parameters for opening an ODBC connection to SQL Server
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Login name
    pub uid: String,
    /// Path and file name of the ODBC driver, or its registered name
    pub driver: String,
    /// Server name, IP or DSN
    pub server: String,
    pub database: String,
    pub pwd: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind and fetch text as UTF-16 wide characters
    #[serde(default = "default_prefer_unicode")]
    pub prefer_unicode: bool,
    /// Schema used to qualify bulk-load targets
    #[serde(default = "default_schema")]
    pub schema: String,
    /// Rows sent to the driver per bulk insert round trip
    #[serde(default = "default_insert_batch_size")]
    pub insert_batch_size: usize,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_prefer_unicode() -> bool {
    true
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_insert_batch_size() -> usize {
    DEFAULT_INSERT_BATCH_SIZE
}

impl ConnectionConfig {
    pub fn new(
        uid: impl Into<String>,
        driver: impl Into<String>,
        server: impl Into<String>,
        database: impl Into<String>,
        pwd: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            driver: driver.into(),
            server: server.into(),
            database: database.into(),
            pwd: pwd.into(),
            port: DEFAULT_PORT,
            prefer_unicode: true,
            schema: default_schema(),
            insert_batch_size: DEFAULT_INSERT_BATCH_SIZE,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = schema.into();
        self
    }

    pub fn with_prefer_unicode(mut self, prefer_unicode: bool) -> Self {
        self.prefer_unicode = prefer_unicode;
        self
    }

    pub fn with_insert_batch_size(mut self, rows: usize) -> Self {
        self.insert_batch_size = rows.max(1);
        self
    }

    /// Server address including the port, unless the server already names one.
    pub fn server_address(&self) -> String {
        if self.server.contains(',') {
            self.server.clone()
        } else {
            format!("{},{}", self.server, self.port)
        }
    }

    /// ODBC connection string for these parameters.
    pub fn connection_string(&self) -> String {
        let server = self.server_address();
        [
            ("Driver", self.driver.as_str()),
            ("Server", server.as_str()),
            ("Database", self.database.as_str()),
            ("UID", self.uid.as_str()),
            ("PWD", self.pwd.as_str()),
        ]
        .iter()
        .map(|(key, value)| format!("{}={};", key, escape_attribute(value)))
        .collect()
    }
}

// Braced when the value holds `;`, braces or edge whitespace.
fn escape_attribute(value: &str) -> String {
    let needs_braces = value.contains([';', '{', '}'])
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace);
    if needs_braces {
        format!("{{{}}}", value.replace('}', "}}"))
    } else {
        value.to_string()
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("uid", &self.uid)
            .field("driver", &self.driver)
            .field("server", &self.server)
            .field("database", &self.database)
            .field("pwd", &"***")
            .field("port", &self.port)
            .field("prefer_unicode", &self.prefer_unicode)
            .field("schema", &self.schema)
            .field("insert_batch_size", &self.insert_batch_size)
            .finish()
    }
}
