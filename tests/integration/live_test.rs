//! Validation against live Postgres, MySQL and SQL Server.
//!
//! Skipped unless DATABASE_URL, MYSQL_URL or MSSQL_URL is set.

use std::sync::Arc;

use db_sqlvet::config::{ConnectionDescriptor, ExecutionOptions, ValidationRequest};
use db_sqlvet::connection::ConnectionManager;
use db_sqlvet::db::Dialect;
use db_sqlvet::validation::{validate_request, ValidationResult};

use super::common::live_url;

async fn validate_live(var: &str, sql: &str) -> Option<ValidationResult> {
    let Some(url) = live_url(var) else {
        eprintln!("Skipping test: {var} not set");
        return None;
    };

    let descriptor = ConnectionDescriptor::from_connection_string(&url).unwrap();
    let manager = Arc::new(ConnectionManager::new());
    let request = ValidationRequest::new(sql, descriptor, ExecutionOptions::default());

    let result = validate_request(Arc::clone(&manager), &request, ExecutionOptions::default())
        .await
        .unwrap();
    assert_eq!(manager.active_connections(), 0);
    Some(result)
}

#[tokio::test]
async fn test_postgres_select_with_plan() {
    let Some(result) = validate_live("DATABASE_URL", "SELECT 1 AS one").await else {
        return;
    };

    assert!(result.is_valid);
    let plan = result.execution_plan.unwrap();
    assert!(plan.plan.is_some());
    assert!(plan.cost.is_some());
    assert_eq!(result.sample_results.unwrap().rows.len(), 1);
}

#[tokio::test]
async fn test_postgres_syntax_error_reported() {
    let Some(result) = validate_live("DATABASE_URL", "SELECT FROM WHERE nothing").await else {
        return;
    };

    assert!(!result.is_valid);
    assert!(result.syntax_check.error.is_some());
}

#[tokio::test]
async fn test_mysql_select() {
    let Some(result) = validate_live("MYSQL_URL", "SELECT 1 AS one").await else {
        return;
    };

    assert!(result.is_valid);
    assert_eq!(result.sample_results.unwrap().rows.len(), 1);
}

#[tokio::test]
async fn test_mssql_select_uses_top() {
    let Some(result) = validate_live("MSSQL_URL", "SELECT name FROM sys.databases").await else {
        return;
    };

    assert!(result.is_valid);
    assert!(!result.sample_results.unwrap().rows.is_empty());
}

#[tokio::test]
async fn test_unreachable_server_is_connection_error() {
    let descriptor = ConnectionDescriptor::new(Dialect::Postgres, "testdb")
        .with_host("localhost")
        .with_port(59999)
        .with_credentials("testuser", Some("testpass".to_string()));
    let manager = Arc::new(ConnectionManager::new());
    let request = ValidationRequest::new("SELECT 1", descriptor, ExecutionOptions::default());

    let err = validate_request(Arc::clone(&manager), &request, ExecutionOptions::default())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "CONNECTION_ERROR");
    assert_eq!(manager.active_connections(), 0);
}
