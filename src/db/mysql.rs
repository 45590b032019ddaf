//! MySQL database client implementation.

use crate::config::ConnectionDescriptor;
use crate::db::{map_connection_error, ColumnInfo, DatabaseClient, Dialect, QueryResult, Row, Value};
use crate::error::{Result, ValidatorError};
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlRow, MySqlSslMode};
use sqlx::{Column as SqlxColumn, ConnectOptions, Connection, Row as SqlxRow, TypeInfo};
use tokio::sync::Mutex;
use tracing::debug;

/// MySQL database client.
#[derive(Debug)]
pub struct MysqlClient {
    conn: Mutex<Option<MySqlConnection>>,
}

impl MysqlClient {
    /// Opens one connection described by `descriptor`.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let options = connect_options(descriptor)?;

        let conn = options
            .connect()
            .await
            .map_err(|e| map_connection_error(&e.to_string(), descriptor))?;

        debug!("Connected to {}", descriptor.display_string());
        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }
}

fn connect_options(descriptor: &ConnectionDescriptor) -> Result<MySqlConnectOptions> {
    let mut options = match &descriptor.connection_string {
        Some(conn_str) => conn_str
            .parse::<MySqlConnectOptions>()
            .map_err(|e| ValidatorError::config(format!("Invalid connection string: {e}")))?,
        None => MySqlConnectOptions::new(),
    };

    options = options.database(&descriptor.database);

    if let Some(host) = &descriptor.host {
        options = options.host(host);
    }
    if let Some(port) = descriptor.port {
        options = options.port(port);
    }
    if let Some(username) = &descriptor.username {
        options = options.username(username);
    }
    if let Some(password) = &descriptor.password {
        options = options.password(password);
    }

    if descriptor.ssl {
        options = options.ssl_mode(MySqlSslMode::Required);
    } else if descriptor.connection_string.is_none() {
        options = options.ssl_mode(MySqlSslMode::Disabled);
    }

    Ok(options)
}

#[async_trait]
impl DatabaseClient for MysqlClient {
    fn dialect(&self) -> Dialect {
        Dialect::Mysql
    }

    async fn execute_raw(&self, sql: &str) -> Result<QueryResult> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| ValidatorError::query("Connection is closed"))?;

        let rows = sqlx::Executor::fetch_all(&mut *conn, sqlx::raw_sql(sql))
            .await
            .map_err(|e| ValidatorError::query(format_query_error(e)))?;

        let columns: Vec<ColumnInfo> = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let rows: Vec<Row> = rows.iter().map(convert_row).collect();
        Ok(QueryResult::with_data(columns, rows))
    }

    async fn close(&self) -> Result<()> {
        if let Some(conn) = self.conn.lock().await.take() {
            conn.close()
                .await
                .map_err(|e| ValidatorError::connection(format!("Failed to close connection: {e}")))?;
        }
        Ok(())
    }
}

fn convert_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

fn convert_value(row: &MySqlRow, index: usize, type_name: &str) -> Value {
    let decoded = match type_name {
        "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .map(|v| v.map(Value::Bool)),

        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => row
            .try_get_unchecked::<Option<i64>, _>(index)
            .map(|v| v.map(Value::Int)),

        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED" => row
            .try_get_unchecked::<Option<u32>, _>(index)
            .map(|v| v.map(|v| Value::Int(v as i64))),

        // Values beyond i64 keep their exact text form.
        "BIGINT UNSIGNED" => row.try_get::<Option<u64>, _>(index).map(|v| {
            v.map(|v| i64::try_from(v).map_or_else(|_| Value::String(v.to_string()), Value::Int))
        }),

        "FLOAT" => row
            .try_get::<Option<f32>, _>(index)
            .map(|v| v.map(|v| Value::Float(v as f64))),

        "DOUBLE" => row
            .try_get::<Option<f64>, _>(index)
            .map(|v| v.map(Value::Float)),

        "JSON" => row
            .try_get::<Option<serde_json::Value>, _>(index)
            .map(|v| v.map(Value::Json)),

        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .map(|v| v.map(bytes_to_value)),

        _ => row
            .try_get::<Option<String>, _>(index)
            .map(|v| v.map(Value::String)),
    };

    match decoded {
        Ok(value) => value.unwrap_or(Value::Null),
        Err(_) => row
            .try_get_unchecked::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Binary columns that hold UTF-8 text (common for SHOW output) become strings.
fn bytes_to_value(bytes: Vec<u8>) -> Value {
    match String::from_utf8(bytes) {
        Ok(text) => Value::String(text),
        Err(e) => Value::Bytes(e.into_bytes()),
    }
}

fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => match db_error.code() {
            Some(code) => format!("ERROR {code}: {}", db_error.message()),
            None => format!("ERROR: {}", db_error.message()),
        },
        None => error.to_string(),
    }
}
