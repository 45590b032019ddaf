//! SQL Server database client implementation.
//!
//! Uses tiberius over a tokio TCP stream. Each `execute_raw` call is sent
//! as its own batch.

use crate::config::ConnectionDescriptor;
use crate::db::{map_connection_error, ColumnInfo, DatabaseClient, Dialect, QueryResult, Row, Value};
use crate::error::{Result, ValidatorError};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

type TdsClient = Client<Compat<TcpStream>>;

/// SQL Server database client.
pub struct MssqlClient {
    conn: Mutex<Option<TdsClient>>,
}

impl MssqlClient {
    /// Opens one connection described by `descriptor`.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let config = tds_config(descriptor)?;

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| map_connection_error(&e.to_string(), descriptor))?;
        tcp.set_nodelay(true)
            .map_err(|e| map_connection_error(&e.to_string(), descriptor))?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| map_connection_error(&e.to_string(), descriptor))?;

        debug!("Connected to {}", descriptor.display_string());
        Ok(Self {
            conn: Mutex::new(Some(client)),
        })
    }
}

/// Builds the TDS config. ADO.NET and JDBC connection strings are used as
/// the base; explicit descriptor fields override them.
fn tds_config(descriptor: &ConnectionDescriptor) -> Result<Config> {
    let (mut config, native_base) = match descriptor.connection_string.as_deref() {
        Some(conn_str) if conn_str.starts_with("jdbc:") => (
            Config::from_jdbc_string(conn_str)
                .map_err(|e| ValidatorError::config(format!("Invalid connection string: {e}")))?,
            true,
        ),
        Some(conn_str) if !conn_str.contains("://") => (
            Config::from_ado_string(conn_str)
                .map_err(|e| ValidatorError::config(format!("Invalid connection string: {e}")))?,
            true,
        ),
        _ => (Config::new(), false),
    };

    if let Some(host) = &descriptor.host {
        config.host(host);
    }
    if let Some(port) = descriptor.port {
        config.port(port);
    }
    config.database(&descriptor.database);

    if let Some(username) = &descriptor.username {
        let password = descriptor.password.as_deref().unwrap_or_default();
        config.authentication(AuthMethod::sql_server(username, password));
    }

    if descriptor.ssl {
        config.encryption(EncryptionLevel::Required);
        config.trust_cert();
    } else if !native_base {
        // URL descriptors carry no encryption setting of their own.
        config.encryption(EncryptionLevel::NotSupported);
    }

    Ok(config)
}

#[async_trait]
impl DatabaseClient for MssqlClient {
    fn dialect(&self) -> Dialect {
        Dialect::Mssql
    }

    async fn execute_raw(&self, sql: &str) -> Result<QueryResult> {
        let mut guard = self.conn.lock().await;
        let client = guard
            .as_mut()
            .ok_or_else(|| ValidatorError::query("Connection is closed"))?;

        let mut stream = client
            .simple_query(sql.to_string())
            .await
            .map_err(|e| ValidatorError::query(format!("ERROR: {e}")))?;

        let columns: Vec<ColumnInfo> = stream
            .columns()
            .await
            .map_err(|e| ValidatorError::query(format!("ERROR: {e}")))?
            .map(|cols| {
                cols.iter()
                    .map(|col| ColumnInfo::new(col.name(), format!("{:?}", col.column_type())))
                    .collect()
            })
            .unwrap_or_default();

        let rows: Vec<Row> = stream
            .into_first_result()
            .await
            .map_err(|e| ValidatorError::query(format!("ERROR: {e}")))?
            .into_iter()
            .map(|row| row.into_iter().map(|data| convert_value(&data)).collect())
            .collect();

        Ok(QueryResult::with_data(columns, rows))
    }

    async fn close(&self) -> Result<()> {
        if let Some(client) = self.conn.lock().await.take() {
            client
                .close()
                .await
                .map_err(|e| ValidatorError::connection(format!("Failed to close connection: {e}")))?;
        }
        Ok(())
    }
}

/// Converts a TDS cell to our Value type.
fn convert_value(data: &ColumnData<'static>) -> Value {
    match data {
        ColumnData::U8(v) => v.map(|v| Value::Int(v as i64)).into(),
        ColumnData::I16(v) => v.map(|v| Value::Int(v as i64)).into(),
        ColumnData::I32(v) => v.map(|v| Value::Int(v as i64)).into(),
        ColumnData::I64(v) => v.map(Value::Int).into(),
        ColumnData::F32(v) => v.map(|v| Value::Float(v as f64)).into(),
        ColumnData::F64(v) => v.map(Value::Float).into(),
        ColumnData::Bit(v) => v.map(Value::Bool).into(),
        ColumnData::String(v) => v.as_ref().map(|s| Value::String(s.to_string())).into(),
        ColumnData::Guid(v) => v.map(|g| Value::String(g.to_string())).into(),
        ColumnData::Binary(v) => v.as_ref().map(|b| Value::Bytes(b.to_vec())).into(),
        ColumnData::Numeric(v) => v.map(|n| Value::String(n.to_string())).into(),
        ColumnData::Xml(v) => v.as_ref().map(|x| Value::String(x.to_string())).into(),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            temporal::<NaiveDateTime>(data, |v| v.to_string())
        }
        ColumnData::Date(_) => temporal::<NaiveDate>(data, |v| v.to_string()),
        ColumnData::Time(_) => temporal::<NaiveTime>(data, |v| v.to_string()),
        ColumnData::DateTimeOffset(_) => {
            temporal::<DateTime<FixedOffset>>(data, |v| v.to_rfc3339())
        }
    }
}

fn temporal<'a, T>(data: &'a ColumnData<'static>, render: impl Fn(T) -> String) -> Value
where
    T: FromSql<'a>,
{
    T::from_sql(data)
        .ok()
        .flatten()
        .map(|v| Value::String(render(v)))
        .unwrap_or(Value::Null)
}
