//! Connection manager for database lifecycle.
//!
//! Every connection is opened for exactly one executor and closed when that
//! executor is done. There is no pooling or reuse.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::QueryOptions;
use crate::config::ConnectionDescriptor;
use crate::db::{Connector, DatabaseClient, Dialect, NativeConnector, QueryResult};
use crate::error::{Result, ValidatorError};

/// Identifier of a live connection in the registry.
pub type ConnectionId = String;

/// A live connection with its metadata.
struct ConnectionHandle {
    client: Arc<dyn DatabaseClient>,
    descriptor: ConnectionDescriptor,
    created_at: DateTime<Utc>,
}

/// Summary of a live connection, safe to log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub dialect: Dialect,
    /// Descriptor display string (never includes the password).
    pub target: String,
    pub created_at: DateTime<Utc>,
}

impl ConnectionInfo {
    /// Time since the connection was opened.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at).to_std().unwrap_or_default()
    }
}

/// Registry of live database connections.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    handles: Mutex<HashMap<ConnectionId, ConnectionHandle>>,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    /// Creates a manager backed by the real drivers.
    pub fn new() -> Self {
        Self::with_connector(Arc::new(NativeConnector))
    }

    /// Creates a manager that opens clients through `connector`.
    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a connection and registers it under a fresh id.
    pub async fn create_connection(&self, descriptor: &ConnectionDescriptor) -> Result<ConnectionId> {
        let client = self.connector.connect(descriptor).await.map_err(|e| match e {
            ValidatorError::Connection(_) => e,
            other => ValidatorError::connection(other.to_string()),
        })?;

        let id = format!("conn_{}", Uuid::new_v4().simple());
        self.handles.lock().insert(
            id.clone(),
            ConnectionHandle {
                client: Arc::from(client),
                descriptor: descriptor.clone(),
                created_at: Utc::now(),
            },
        );

        info!("Opened connection {} to {}", id, descriptor.display_string());
        Ok(id)
    }

    /// Returns true if a connection can be opened and closed again.
    ///
    /// Never fails; any error yields `false`.
    pub async fn test_connection(&self, descriptor: &ConnectionDescriptor) -> bool {
        match self.create_connection(descriptor).await {
            Ok(id) => {
                let Some(handle) = self.handles.lock().remove(&id) else {
                    return false;
                };
                match handle.client.close().await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Connection test close failed: {}", e);
                        false
                    }
                }
            }
            Err(e) => {
                debug!("Connection test failed: {}", e);
                false
            }
        }
    }

    /// Runs `sql` on a registered connection under the options' deadline,
    /// keeping at most `max_rows` rows.
    pub async fn execute_query(
        &self,
        id: &str,
        sql: &str,
        options: QueryOptions,
    ) -> Result<QueryResult> {
        // The lock is released before the driver call.
        let client = self.client(id)?;

        debug!("Executing on {}: {}", id, sql);
        let result = tokio::time::timeout(options.timeout, client.execute_raw(sql))
            .await
            .map_err(|_| {
                ValidatorError::query(format!(
                    "Query timed out after {} ms",
                    options.timeout.as_millis()
                ))
            })??;

        let result = result.truncate(options.max_rows);
        if let Some(warning) = result.truncation_warning() {
            warn!("{}", warning);
        }

        Ok(result)
    }

    /// Closes and forgets a connection. Unknown ids are ignored and close
    /// errors are logged, never returned.
    pub async fn close_connection(&self, id: &str) {
        let Some(handle) = self.handles.lock().remove(id) else {
            return;
        };

        match handle.client.close().await {
            Ok(()) => info!("Closed connection {}", id),
            Err(e) => warn!("Failed to close connection {}: {}", id, e),
        }
    }

    /// Closes every live connection concurrently.
    pub async fn close_all_connections(&self) {
        let handles: Vec<(ConnectionId, ConnectionHandle)> = self.handles.lock().drain().collect();
        if handles.is_empty() {
            return;
        }

        info!("Closing {} connection(s)", handles.len());
        join_all(handles.into_iter().map(|(id, handle)| async move {
            if let Err(e) = handle.client.close().await {
                warn!("Failed to close connection {}: {}", id, e);
            }
        }))
        .await;
    }

    /// Number of live connections.
    pub fn active_connections(&self) -> usize {
        self.handles.lock().len()
    }

    /// Returns metadata about a live connection.
    pub fn connection_info(&self, id: &str) -> Option<ConnectionInfo> {
        self.handles.lock().get(id).map(|handle| ConnectionInfo {
            id: id.to_string(),
            dialect: handle.descriptor.dialect,
            target: handle.descriptor.display_string(),
            created_at: handle.created_at,
        })
    }

    fn client(&self, id: &str) -> Result<Arc<dyn DatabaseClient>> {
        self.handles
            .lock()
            .get(id)
            .map(|handle| Arc::clone(&handle.client))
            .ok_or_else(|| ValidatorError::not_found(id))
    }
}
