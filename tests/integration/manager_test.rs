//! Connection manager lifecycle against real and mock clients.

use std::sync::Arc;
use std::time::Duration;

use db_sqlvet::config::ConnectionDescriptor;
use db_sqlvet::connection::{ConnectionManager, QueryOptions};
use db_sqlvet::db::{Dialect, MockBehavior, MockConnector, Value};
use db_sqlvet::error::ValidatorError;
use pretty_assertions::assert_eq;

use super::common::seeded_sqlite;

fn options() -> QueryOptions {
    QueryOptions::new(Duration::from_secs(5), 100)
}

#[tokio::test]
async fn test_sqlite_connection_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = seeded_sqlite(&dir).await;
    let manager = ConnectionManager::new();

    let id = manager.create_connection(&descriptor).await.unwrap();
    assert!(id.starts_with("conn_"));

    let info = manager.connection_info(&id).unwrap();
    assert_eq!(info.dialect, Dialect::Sqlite);

    let result = manager
        .execute_query(&id, "SELECT name FROM customers ORDER BY id", options())
        .await
        .unwrap();
    assert_eq!(result.rows[1][0], Value::String("grace".to_string()));

    manager.close_connection(&id).await;
    let err = manager
        .execute_query(&id, "SELECT 1", options())
        .await
        .unwrap_err();
    assert!(matches!(err, ValidatorError::ConnectionNotFound(_)));
}

#[tokio::test]
async fn test_sqlite_rows_truncated_to_max() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = seeded_sqlite(&dir).await;
    let manager = ConnectionManager::new();
    let id = manager.create_connection(&descriptor).await.unwrap();

    let result = manager
        .execute_query(&id, "SELECT * FROM orders", QueryOptions::new(Duration::from_secs(5), 7))
        .await
        .unwrap();

    assert_eq!(result.rows.len(), 7);
    assert_eq!(result.row_count, 20);
    assert!(result.was_truncated);

    manager.close_all_connections().await;
    assert_eq!(manager.active_connections(), 0);
}

#[tokio::test]
async fn test_test_connection_against_files() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = seeded_sqlite(&dir).await;
    let manager = ConnectionManager::new();

    assert!(manager.test_connection(&descriptor).await);

    let missing = ConnectionDescriptor::new(
        Dialect::Sqlite,
        dir.path().join("missing.db").to_string_lossy().into_owned(),
    );
    assert!(!manager.test_connection(&missing).await);
    assert_eq!(manager.active_connections(), 0);
}

#[tokio::test]
async fn test_concurrent_requests_get_distinct_connections() {
    let connector = MockConnector::with_behavior(MockBehavior::default());
    let log = connector.log();
    let manager = Arc::new(ConnectionManager::with_connector(Arc::new(connector)));
    let descriptor = ConnectionDescriptor::new(Dialect::Postgres, "app");

    let tasks: Vec<_> = (0..8)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let descriptor = descriptor.clone();
            tokio::spawn(async move { manager.create_connection(&descriptor).await.unwrap() })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }
    ids.sort();
    ids.dedup();

    assert_eq!(ids.len(), 8);
    assert_eq!(manager.active_connections(), 8);

    manager.close_all_connections().await;
    assert_eq!(log.open_count(), 0);
}

#[tokio::test]
async fn test_deadline_fires_for_slow_client() {
    let connector = MockConnector::with_behavior(
        MockBehavior::default().with_delay(Duration::from_millis(500)),
    );
    let manager = ConnectionManager::with_connector(Arc::new(connector));
    let id = manager
        .create_connection(&ConnectionDescriptor::new(Dialect::Mysql, "shop"))
        .await
        .unwrap();

    let err = manager
        .execute_query(&id, "SELECT 1", QueryOptions::new(Duration::from_millis(50), 10))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("timed out after 50 ms"));
    manager.close_connection(&id).await;
}
