//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using a single sqlx connection.

use crate::config::ConnectionDescriptor;
use crate::db::{map_connection_error, ColumnInfo, DatabaseClient, Dialect, QueryResult, Row, Value};
use crate::error::{Result, ValidatorError};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow, PgSslMode};
use sqlx::{Column as SqlxColumn, ConnectOptions, Connection, Row as SqlxRow, TypeInfo};
use tokio::sync::Mutex;
use tracing::debug;

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    conn: Mutex<Option<PgConnection>>,
}

impl PostgresClient {
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

/// Builds connect options: the connection string is the base, explicit
/// descriptor fields override it.
fn connect_options(descriptor: &ConnectionDescriptor) -> Result<PgConnectOptions> {
    let mut options = match &descriptor.connection_string {
        Some(conn_str) => conn_str
            .parse::<PgConnectOptions>()
            .map_err(|e| ValidatorError::config(format!("Invalid connection string: {e}")))?,
        None => PgConnectOptions::new(),
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
        options = options.ssl_mode(PgSslMode::Require);
    } else if descriptor.connection_string.is_none() {
        options = options.ssl_mode(PgSslMode::Disable);
    }

    Ok(options.application_name("sqlvet"))
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn execute_raw(&self, sql: &str) -> Result<QueryResult> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| ValidatorError::query("Connection is closed"))?;

        // Simple protocol, so EXPLAIN and utility statements run as-is.
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

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    let decoded = match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .map(|v| v.map(Value::Bool)),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .map(|v| v.map(|v| Value::Int(v as i64))),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .map(|v| v.map(|v| Value::Int(v as i64))),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .map(|v| v.map(Value::Int)),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .map(|v| v.map(|v| Value::Float(v as f64))),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .map(|v| v.map(Value::Float)),

        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(index)
            .map(|v| v.map(Value::Json)),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .map(|v| v.map(Value::Bytes)),

        _ => row
            .try_get::<Option<String>, _>(index)
            .map(|v| v.map(Value::String)),
    };

    match decoded {
        Ok(value) => value.unwrap_or(Value::Null),
        // Text protocol values always have a string form.
        Err(_) => row
            .try_get_unchecked::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Formats a query error with hints if available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests require a running PostgreSQL database and are skipped
    // unless DATABASE_URL is set.

    async fn get_test_client() -> Option<PostgresClient> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let descriptor = ConnectionDescriptor::from_connection_string(&url).ok()?;
        PostgresClient::connect(&descriptor).await.ok()
    }

    #[test]
    fn test_connect_options_explicit_fields_override() {
        let mut descriptor =
            ConnectionDescriptor::from_connection_string("postgres://a:b@base.local:5433/base")
                .unwrap();
        descriptor.host = Some("override.local".to_string());
        descriptor.database = "other".to_string();

        let options = connect_options(&descriptor).unwrap();
        assert_eq!(options.get_host(), "override.local");
        assert_eq!(options.get_port(), 5433);
        assert_eq!(options.get_database(), Some("other"));
        assert_eq!(options.get_username(), "a");
    }

    #[test]
    fn test_connect_options_ssl_mode() {
        let plain = ConnectionDescriptor::new(Dialect::Postgres, "app");
        assert!(matches!(
            connect_options(&plain).unwrap().get_ssl_mode(),
            PgSslMode::Disable
        ));

        let tls = ConnectionDescriptor::new(Dialect::Postgres, "app").with_ssl(true);
        assert!(matches!(
            connect_options(&tls).unwrap().get_ssl_mode(),
            PgSslMode::Require
        ));
    }

    #[tokio::test]
    async fn test_execute_select_query() {
        let Some(client) = get_test_client().await else {
            eprintln!("Skipping test: DATABASE_URL not set");
            return;
        };

        let result = client
            .execute_raw("SELECT 1 as num, 'hello' as greeting")
            .await
            .unwrap();

        assert_eq!(result.columns.len(), 2);
        assert_eq!(result.columns[0].name, "num");
        assert_eq!(result.rows[0][0], Value::Int(1));
        assert_eq!(result.rows[0][1], Value::String("hello".to_string()));

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_explain_json_plan() {
        let Some(client) = get_test_client().await else {
            eprintln!("Skipping test: DATABASE_URL not set");
            return;
        };

        let result = client
            .execute_raw("EXPLAIN (FORMAT JSON) SELECT 1")
            .await
            .unwrap();
        let plan = result.rows[0][0].as_json().unwrap();
        assert!(plan[0]["Plan"]["Plan Rows"].is_number());

        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_execute_query_with_error() {
        let Some(client) = get_test_client().await else {
            eprintln!("Skipping test: DATABASE_URL not set");
            return;
        };

        let result = client.execute_raw("SELECT * FROM nonexistent_table_xyz").await;
        let error = result.unwrap_err();
        assert!(matches!(error, ValidatorError::Query(_)));
        assert!(error.to_string().contains("nonexistent_table_xyz"));

        client.close().await.unwrap();
        client.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_connect_is_connection_error() {
        let descriptor = ConnectionDescriptor::new(Dialect::Postgres, "testdb")
            .with_host("127.0.0.1")
            .with_port(1)
            .with_credentials("testuser", Some("testpass".to_string()));

        let result = PostgresClient::connect(&descriptor).await;
        assert!(matches!(result, Err(ValidatorError::Connection(_))));
    }
}
