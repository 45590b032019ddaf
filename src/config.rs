//! Configuration and request types for sqlvet.
//!
//! Holds the per-request connection descriptor and execution options, the
//! request envelope consumed at the boundary, and the optional TOML config
//! file with named connections and default options.

use crate::connection::QueryOptions;
use crate::db::Dialect;
use crate::error::{Result, ValidatorError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Lower bound for the query timeout, in milliseconds.
pub const MIN_TIMEOUT_MS: u64 = 1_000;
/// Upper bound for the query timeout, in milliseconds.
pub const MAX_TIMEOUT_MS: u64 = 300_000;
/// Lower bound for sample rows.
pub const MIN_MAX_ROWS: usize = 1;
/// Upper bound for sample rows.
pub const MAX_MAX_ROWS: usize = 10_000;

/// Main configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Default execution options applied when a request omits them.
    #[serde(default)]
    pub defaults: ExecutionOptions,

    /// Named database connections.
    #[serde(default)]
    pub connections: HashMap<String, ConnectionDescriptor>,
}

/// Describes how to reach one target database.
///
/// Supplied per request and never persisted. The password is skipped when
/// serializing so results and logs cannot echo it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDescriptor {
    /// Target dialect.
    pub dialect: Dialect,

    /// Database host (defaults to localhost).
    #[serde(default)]
    pub host: Option<String>,

    /// Database port (defaults to the dialect's port).
    #[serde(default)]
    pub port: Option<u16>,

    /// Database name, or the file path for SQLite.
    pub database: String,

    /// Database user.
    #[serde(default)]
    pub username: Option<String>,

    /// Database password.
    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    /// Driver-native connection string used as the base option set.
    #[serde(default, skip_serializing)]
    pub connection_string: Option<String>,

    /// Whether to negotiate TLS.
    #[serde(default)]
    pub ssl: bool,
}

impl ConnectionDescriptor {
    /// Creates a descriptor with only the required fields.
    pub fn new(dialect: Dialect, database: impl Into<String>) -> Self {
        Self {
            dialect,
            host: None,
            port: None,
            database: database.into(),
            username: None,
            password: None,
            connection_string: None,
            ssl: false,
        }
    }

    /// Sets the host.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets username and password.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }

    /// Enables or disables TLS.
    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Returns the host, defaulting to localhost.
    pub fn host_or_default(&self) -> &str {
        self.host.as_deref().unwrap_or("localhost")
    }

    /// Returns the port, defaulting to the dialect's port.
    ///
    /// `None` only for SQLite, which has no network port.
    pub fn port_or_default(&self) -> Option<u16> {
        self.port.or_else(|| self.dialect.default_port())
    }

    /// Parses a descriptor from a URL.
    ///
    /// Accepted schemes: `postgres`, `postgresql`, `mysql`, `mssql`,
    /// `sqlserver` and `sqlite` (`sqlite:///abs/path.db`, `sqlite://rel.db`,
    /// `sqlite::memory:`). The original string is kept as the connection
    /// string so driver-specific query parameters survive.
    pub fn from_connection_string(conn_str: &str) -> Result<Self> {
        if let Some(rest) = conn_str.strip_prefix("sqlite:") {
            let path = rest.strip_prefix("//").unwrap_or(rest);
            if path.is_empty() {
                return Err(ValidatorError::config(
                    "SQLite connection string must include a file path",
                ));
            }
            return Ok(Self::new(Dialect::Sqlite, path));
        }

        let url = Url::parse(conn_str)
            .map_err(|e| ValidatorError::config(format!("Invalid connection string: {e}")))?;

        let dialect = Dialect::from_scheme(url.scheme()).ok_or_else(|| {
            ValidatorError::config(format!(
                "Invalid scheme '{}'. Expected one of postgres, mysql, mssql, sqlite",
                url.scheme()
            ))
        })?;

        let database = url
            .path()
            .strip_prefix('/')
            .filter(|db| !db.is_empty())
            .map(String::from)
            .ok_or_else(|| ValidatorError::config("Connection string must include a database"))?;

        let ssl = url.query_pairs().any(|(key, value)| {
            let key = key.to_lowercase();
            let value = value.to_lowercase();
            ((key == "sslmode" || key == "ssl-mode") && value != "disable" && value != "disabled")
                || ((key == "ssl" || key == "encrypt") && value == "true")
        });

        Ok(Self {
            dialect,
            host: url.host_str().map(String::from),
            port: url.port(),
            database,
            username: Some(url.username())
                .filter(|u| !u.is_empty())
                .map(String::from),
            password: url.password().map(String::from),
            connection_string: Some(conn_str.to_string()),
            ssl,
        })
    }

    /// Checks the fields the drivers cannot do without.
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(ValidatorError::validation("connection.database is required"));
        }
        Ok(())
    }

    /// Returns a display-safe string (no password) for logs and output.
    pub fn display_string(&self) -> String {
        match self.port_or_default() {
            Some(port) => format!(
                "{} {} @ {}:{}",
                self.dialect.as_str(),
                self.database,
                self.host_or_default(),
                port
            ),
            None => format!("{} {}", self.dialect.as_str(), self.database),
        }
    }
}

/// Options controlling one validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOptions {
    /// Require the statement to be classified read-only.
    #[serde(default = "default_readonly")]
    pub readonly: bool,

    /// Per-query deadline in milliseconds.
    #[serde(default = "default_timeout_ms", rename = "timeout", alias = "timeoutMs")]
    pub timeout_ms: u64,

    /// Maximum rows kept from the sample execution.
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Whether to retrieve an execution plan.
    #[serde(default = "default_explain")]
    pub explain: bool,
}

fn default_readonly() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_rows() -> usize {
    1_000
}

fn default_explain() -> bool {
    true
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            readonly: default_readonly(),
            timeout_ms: default_timeout_ms(),
            max_rows: default_max_rows(),
            explain: default_explain(),
        }
    }
}

impl ExecutionOptions {
    /// Creates options, clamping numeric fields to their allowed ranges.
    pub fn new(readonly: bool, timeout_ms: u64, max_rows: usize, explain: bool) -> Self {
        Self {
            readonly,
            timeout_ms,
            max_rows,
            explain,
        }
        .clamped()
    }

    /// Returns a copy with timeout and max rows clamped to their ranges.
    pub fn clamped(self) -> Self {
        Self {
            timeout_ms: self.timeout_ms.clamp(MIN_TIMEOUT_MS, MAX_TIMEOUT_MS),
            max_rows: self.max_rows.clamp(MIN_MAX_ROWS, MAX_MAX_ROWS),
            ..self
        }
    }

    /// Returns the timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Returns the per-query options passed to the connection manager.
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::new(self.timeout(), self.max_rows)
    }
}

/// A validation request as received from the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// SQL text to validate.
    pub sql: String,

    /// Target database.
    pub connection: ConnectionDescriptor,

    /// Execution options; defaults apply when absent.
    #[serde(default)]
    pub options: Option<ExecutionOptions>,
}

impl ValidationRequest {
    /// Creates a request with explicit options.
    pub fn new(
        sql: impl Into<String>,
        connection: ConnectionDescriptor,
        options: ExecutionOptions,
    ) -> Self {
        Self {
            sql: sql.into(),
            connection,
            options: Some(options),
        }
    }

    /// Parses a request from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ValidatorError::validation(format!("Invalid request: {e}")))
    }

    /// Rejects malformed input before any connection is attempted.
    pub fn validate(&self) -> Result<()> {
        if self.sql.trim().is_empty() {
            return Err(ValidatorError::validation("sql must not be empty"));
        }
        self.connection.validate()
    }

    /// Returns the request options, or `defaults`, clamped.
    pub fn effective_options(&self, defaults: ExecutionOptions) -> ExecutionOptions {
        self.options.unwrap_or(defaults).clamped()
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sqlvet")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ValidatorError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            ValidatorError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Gets a named connection, or the default connection if name is None.
    pub fn get_connection(&self, name: Option<&str>) -> Option<&ConnectionDescriptor> {
        let key = name.unwrap_or("default");
        self.connections.get(key)
    }
}
