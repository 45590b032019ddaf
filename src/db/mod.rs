//! Database abstraction layer for sqlvet.
//!
//! Provides a trait-based interface over the four supported dialects, so
//! the connection manager and executor never touch a driver directly.

mod mock;
mod mssql;
mod mysql;
mod postgres;
mod sqlite;
mod types;

pub use mock::{FailingConnector, MockBehavior, MockCallLog, MockConnector, MockDatabaseClient};
pub use mssql::MssqlClient;
pub use mysql::MysqlClient;
pub use postgres::PostgresClient;
pub use sqlite::SqliteClient;
pub use types::{ColumnInfo, QueryResult, Row, Value};

use crate::config::ConnectionDescriptor;
use crate::error::{Result, ValidatorError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for establishing a connection, for every dialect.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[serde(alias = "postgresql")]
    Postgres,
    Mysql,
    #[serde(alias = "sqlite3")]
    Sqlite,
    #[serde(alias = "sqlserver")]
    Mssql,
}

/// Capabilities every dialect offers through this crate.
const DIALECT_FEATURES: &[&str] = &[
    "syntax check",
    "execution plan",
    "sample execution",
    "security check",
];

impl Dialect {
    /// All supported dialects, in display order.
    pub const ALL: [Dialect; 4] = [Self::Postgres, Self::Mysql, Self::Sqlite, Self::Mssql];

    /// Returns the dialect as its wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Mysql => "mysql",
            Self::Sqlite => "sqlite",
            Self::Mssql => "mssql",
        }
    }

    /// Parses a dialect from a string, accepting common aliases.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "mysql" => Some(Self::Mysql),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            "mssql" | "sqlserver" => Some(Self::Mssql),
            _ => None,
        }
    }

    /// Maps a connection URL scheme to a dialect.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        Self::parse(scheme)
    }

    /// Returns the default port, or `None` for file-based SQLite.
    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::Postgres => Some(5432),
            Self::Mysql => Some(3306),
            Self::Sqlite => None,
            Self::Mssql => Some(1433),
        }
    }

    /// Returns the product name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Postgres => "PostgreSQL",
            Self::Mysql => "MySQL",
            Self::Sqlite => "SQLite",
            Self::Mssql => "SQL Server",
        }
    }

    /// Returns the listing entry for this dialect.
    pub fn info(&self) -> DialectInfo {
        DialectInfo {
            name: self.display_name(),
            value: *self,
            description: match self {
                Self::Postgres => "PostgreSQL database",
                Self::Mysql => "MySQL database",
                Self::Sqlite => "SQLite database file",
                Self::Mssql => "Microsoft SQL Server database",
            },
            features: DIALECT_FEATURES,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = ValidatorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| {
            ValidatorError::config(format!(
                "Unsupported dialect '{s}'. Expected one of postgres, mysql, sqlite, mssql"
            ))
        })
    }
}

/// A supported dialect as shown to callers.
#[derive(Debug, Clone, Serialize)]
pub struct DialectInfo {
    pub name: &'static str,
    pub value: Dialect,
    pub description: &'static str,
    pub features: &'static [&'static str],
}

/// Returns the listing of all supported dialects.
pub fn supported_dialects() -> Vec<DialectInfo> {
    Dialect::ALL.iter().map(Dialect::info).collect()
}

/// Trait defining the interface for one live database connection.
///
/// Each client owns exactly one physical connection.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// Returns the dialect this client speaks.
    fn dialect(&self) -> Dialect;

    /// Executes raw SQL text and returns every row the driver produced.
    async fn execute_raw(&self, sql: &str) -> Result<QueryResult>;

    /// Closes the connection. Closing twice is a no-op.
    async fn close(&self) -> Result<()>;
}

/// Opens database clients from connection descriptors.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens one physical connection described by `descriptor`.
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>>;
}

/// Connector backed by the real drivers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeConnector;

#[async_trait]
impl Connector for NativeConnector {
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>> {
        connect(descriptor).await
    }
}

/// Creates a database client for the given descriptor.
///
/// This is the central factory function for database connections. Every
/// dialect is bounded by [`CONNECT_TIMEOUT`].
pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>> {
    let attempt = async {
        let client: Box<dyn DatabaseClient> = match descriptor.dialect {
            Dialect::Postgres => Box::new(PostgresClient::connect(descriptor).await?),
            Dialect::Mysql => Box::new(MysqlClient::connect(descriptor).await?),
            Dialect::Sqlite => Box::new(SqliteClient::connect(descriptor).await?),
            Dialect::Mssql => Box::new(MssqlClient::connect(descriptor).await?),
        };
        Ok::<_, ValidatorError>(client)
    };

    tokio::time::timeout(CONNECT_TIMEOUT, attempt)
        .await
        .map_err(|_| {
            ValidatorError::connection(format!(
                "Connection to {} timed out after {} seconds",
                descriptor.display_string(),
                CONNECT_TIMEOUT.as_secs()
            ))
        })?
}

/// Maps driver connection failures to user-friendly messages.
pub(crate) fn map_connection_error(error: &str, descriptor: &ConnectionDescriptor) -> ValidatorError {
    let host = descriptor.host_or_default();
    let port = descriptor
        .port_or_default()
        .map(|p| p.to_string())
        .unwrap_or_default();
    let user = descriptor.username.as_deref().unwrap_or("unknown");
    let database = &descriptor.database;

    let error_str = error.to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        ValidatorError::connection(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
        || error_str.contains("access denied")
        || error_str.contains("login failed")
    {
        ValidatorError::connection(format!(
            "Authentication failed for user '{user}'. Check your credentials."
        ))
    } else if error_str.contains("unknown database")
        || (error_str.contains("does not exist") && error_str.contains("database"))
        || error_str.contains("unable to open database file")
    {
        ValidatorError::connection(format!("Database '{database}' does not exist."))
    } else if error_str.contains("ssl") || error_str.contains("tls") {
        ValidatorError::connection(format!(
            "TLS negotiation with {host}:{port} failed: {error}"
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        ValidatorError::connection(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        ValidatorError::connection(error.to_string())
    }
}
