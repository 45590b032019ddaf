//! End-to-end validation against real SQLite files.

use std::sync::Arc;

use db_sqlvet::config::{ConnectionDescriptor, ExecutionOptions, ValidationRequest};
use db_sqlvet::connection::ConnectionManager;
use db_sqlvet::db::{Dialect, Value};
use db_sqlvet::error::ValidatorError;
use db_sqlvet::validation::{validate_request, ApiResponse, Complexity};
use pretty_assertions::assert_eq;

use super::common::seeded_sqlite;

async fn validate(
    manager: &Arc<ConnectionManager>,
    descriptor: &ConnectionDescriptor,
    sql: &str,
    options: ExecutionOptions,
) -> db_sqlvet::validation::ValidationResult {
    let request = ValidationRequest::new(sql, descriptor.clone(), options);
    validate_request(Arc::clone(manager), &request, ExecutionOptions::default())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_valid_join_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = seeded_sqlite(&dir).await;
    let manager = Arc::new(ConnectionManager::new());

    let result = validate(
        &manager,
        &descriptor,
        "SELECT o.id, c.name FROM orders o JOIN customers c ON o.cid = c.id ORDER BY o.id",
        ExecutionOptions::default(),
    )
    .await;

    assert!(result.is_valid);
    assert!(result.syntax_check.valid);
    assert!(result.security_check.is_read_only);
    assert!(result.security_check.blocked_operations.is_empty());

    let plan = result.execution_plan.unwrap();
    assert!(plan.plan.is_some_and(|p| !p.rows.is_empty()));

    let sample = result.sample_results.unwrap();
    assert_eq!(sample.rows.len(), 20);
    assert_eq!(sample.rows[0], vec![Value::Int(1), Value::String("ada".to_string())]);

    let metadata = result.metadata.unwrap();
    assert_eq!(metadata.affected_tables, vec!["orders", "customers"]);
    assert_eq!(metadata.complexity, Complexity::Medium);

    assert_eq!(manager.active_connections(), 0);
}

#[tokio::test]
async fn test_sample_respects_max_rows() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = seeded_sqlite(&dir).await;
    let manager = Arc::new(ConnectionManager::new());

    let result = validate(
        &manager,
        &descriptor,
        "SELECT * FROM orders;",
        ExecutionOptions::new(true, 30_000, 5, false),
    )
    .await;

    assert!(result.is_valid);
    assert!(result.execution_plan.is_none());
    assert_eq!(result.sample_results.unwrap().rows.len(), 5);
}

#[tokio::test]
async fn test_row_limit_applies_after_trailing_comment() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = seeded_sqlite(&dir).await;
    let manager = Arc::new(ConnectionManager::new());

    let result = validate(
        &manager,
        &descriptor,
        "SELECT * FROM orders -- every order",
        ExecutionOptions::new(true, 30_000, 5, false),
    )
    .await;

    assert!(result.is_valid);
    let sample = result.sample_results.unwrap();
    // The database itself stopped at the limit.
    assert_eq!(sample.total_rows, Some(5));
    assert_eq!(sample.rows.len(), 5);
}

#[tokio::test]
async fn test_existing_limit_is_kept() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = seeded_sqlite(&dir).await;
    let manager = Arc::new(ConnectionManager::new());

    let result = validate(
        &manager,
        &descriptor,
        "SELECT * FROM orders LIMIT 3",
        ExecutionOptions::default(),
    )
    .await;

    assert_eq!(result.sample_results.unwrap().rows.len(), 3);
}

#[tokio::test]
async fn test_unknown_table_is_a_syntax_failure() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = seeded_sqlite(&dir).await;
    let manager = Arc::new(ConnectionManager::new());

    let result = validate(
        &manager,
        &descriptor,
        "SELECT * FROM invoices",
        ExecutionOptions::default(),
    )
    .await;

    assert!(!result.is_valid);
    assert!(!result.syntax_check.valid);
    assert!(result
        .syntax_check
        .error
        .unwrap()
        .contains("no such table"));
    assert!(result.sample_results.is_none());
    assert!(result.metadata.is_none());
}

#[tokio::test]
async fn test_blocked_statement_never_reaches_database() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = seeded_sqlite(&dir).await;
    let manager = Arc::new(ConnectionManager::new());

    let result = validate(
        &manager,
        &descriptor,
        "DROP TABLE orders",
        ExecutionOptions::new(false, 30_000, 10, true),
    )
    .await;

    assert!(!result.is_valid);
    assert_eq!(result.security_check.blocked_operations, vec!["DROP TABLE"]);

    // The table is still there.
    let check = validate(
        &manager,
        &descriptor,
        "SELECT count(*) FROM orders",
        ExecutionOptions::default(),
    )
    .await;
    assert!(check.is_valid);
    assert_eq!(check.sample_results.unwrap().rows[0][0], Value::Int(20));
}

#[tokio::test]
async fn test_readonly_rejects_unclassified_statement() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = seeded_sqlite(&dir).await;
    let manager = Arc::new(ConnectionManager::new());

    let result = validate(&manager, &descriptor, "VACUUM", ExecutionOptions::default()).await;

    assert!(!result.is_valid);
    assert!(!result.security_check.is_read_only);
    assert!(result.security_check.blocked_operations.is_empty());
    assert!(result
        .security_check
        .warnings
        .iter()
        .any(|w| w.contains("readonly mode")));
}

#[tokio::test]
async fn test_missing_file_fails_to_connect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.db");
    let descriptor = ConnectionDescriptor::new(Dialect::Sqlite, path.to_string_lossy().into_owned());
    let manager = Arc::new(ConnectionManager::new());

    let request = ValidationRequest::new("SELECT 1", descriptor, ExecutionOptions::default());
    let err = validate_request(Arc::clone(&manager), &request, ExecutionOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ValidatorError::Connection(_)));
    assert!(!path.exists());
    assert_eq!(manager.active_connections(), 0);

    let response = ApiResponse::<()>::error(&err, "SQL validation failed");
    assert_eq!(response.code, Some("CONNECTION_ERROR"));
}

#[tokio::test]
async fn test_json_request_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let descriptor = seeded_sqlite(&dir).await;
    let manager = Arc::new(ConnectionManager::new());

    let json = serde_json::json!({
        "sql": "SELECT name FROM customers",
        "connection": {"dialect": "sqlite", "database": descriptor.database},
        "options": {"maxRows": 1, "explain": false}
    })
    .to_string();
    let request = ValidationRequest::from_json(&json).unwrap();

    let result = validate_request(Arc::clone(&manager), &request, ExecutionOptions::default())
        .await
        .unwrap();
    let response = serde_json::to_value(ApiResponse::ok(result)).unwrap();

    assert_eq!(response["success"], true);
    assert_eq!(response["data"]["isValid"], true);
    assert_eq!(response["data"]["sampleResults"]["rows"], serde_json::json!([["ada"]]));
    assert_eq!(response["data"]["metadata"]["complexity"], "low");
    assert!(response["data"].get("executionPlan").is_none());
}
