//! SQLite database client implementation.
//!
//! Values are converted by their runtime storage class, since SQLite
//! columns carry no enforced type. Results report no column metadata.

use crate::config::ConnectionDescriptor;
use crate::db::{map_connection_error, DatabaseClient, Dialect, QueryResult, Row, Value};
use crate::error::{Result, ValidatorError};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{ConnectOptions, Connection, Row as SqlxRow, TypeInfo, ValueRef};
use std::str::FromStr;
use tokio::sync::Mutex;
use tracing::debug;

const IN_MEMORY: &str = ":memory:";

/// SQLite database client.
#[derive(Debug)]
pub struct SqliteClient {
    conn: Mutex<Option<SqliteConnection>>,
}

impl SqliteClient {
    /// Opens the database file named by `descriptor.database`.
    ///
    /// The file must already exist; `:memory:` opens a private in-memory
    /// database.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let options = connect_options(descriptor)?;

        let conn = options
            .connect()
            .await
            .map_err(|e| map_connection_error(&e.to_string(), descriptor))?;

        debug!("Opened {}", descriptor.display_string());
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }
}

fn connect_options(descriptor: &ConnectionDescriptor) -> Result<SqliteConnectOptions> {
    if descriptor.database == IN_MEMORY {
        return SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| ValidatorError::config(format!("Invalid SQLite options: {e}")));
    }

    Ok(SqliteConnectOptions::new()
        .filename(&descriptor.database)
        .create_if_missing(false))
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn execute_raw(&self, sql: &str) -> Result<QueryResult> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| ValidatorError::query("Connection is closed"))?;

        let rows = sqlx::Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql))
            .await
            .map_err(|e| ValidatorError::query(format_query_error(e)))?;

        let rows: Vec<Row> = rows.iter().map(convert_row).collect();
        Ok(QueryResult::with_data(Vec::new(), rows))
    }

    async fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.close()
                .await
                .map_err(|e| ValidatorError::connection(format!("Failed to close database: {e}")))?;
        }
        Ok(())
    }
}

fn convert_row(row: &SqliteRow) -> Row {
    (0..row.len()).map(|i| convert_value(row, i)).collect()
}

fn convert_value(row: &SqliteRow, index: usize) -> Value {
    let storage_class = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return Value::Null,
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return Value::Null,
    };

    let decoded = match storage_class.as_str() {
        "INTEGER" => row.try_get_unchecked::<i64, _>(index).map(Value::Int),
        "REAL" => row.try_get_unchecked::<f64, _>(index).map(Value::Float),
        "BLOB" => row.try_get_unchecked::<Vec<u8>, _>(index).map(Value::Bytes),
        _ => row.try_get_unchecked::<String, _>(index).map(Value::String),
    };

    decoded.unwrap_or(Value::Null)
}

fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => format!("ERROR: {}", db_error.message()),
        None => error.to_string(),
    }
}
