//! Mock database clients for testing.
//!
//! Provides an in-memory stand-in for the drivers, used by the test suites
//! and by the CLI's `--mock-db` mode. Every mock client created by one
//! connector writes to the same [`MockCallLog`].

use super::{ColumnInfo, Connector, DatabaseClient, Dialect, QueryResult, Row, Value};
use crate::config::ConnectionDescriptor;
use crate::error::{Result, ValidatorError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Shared record of what the mock clients were asked to do.
#[derive(Debug, Default)]
pub struct MockCallLog {
    connects: AtomicUsize,
    closes: AtomicUsize,
    statements: Mutex<Vec<String>>,
}

impl MockCallLog {
    /// Number of successful connects.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of connections actually closed (repeat closes are not counted).
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Number of statements sent to any mock client.
    pub fn execute_count(&self) -> usize {
        self.statements.lock().len()
    }

    /// Statements sent so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().clone()
    }

    /// Connections opened and not yet closed.
    pub fn open_count(&self) -> usize {
        self.connect_count().saturating_sub(self.close_count())
    }
}

/// How mock clients respond to statements.
#[derive(Debug, Clone)]
pub struct MockBehavior {
    /// Rows returned for SELECT/WITH statements.
    pub row_count: usize,

    /// Case-insensitive substrings; a statement containing one fails.
    pub failing_statements: Vec<String>,

    /// Delay applied before answering each statement.
    pub delay: Option<Duration>,

    /// Plan document returned for EXPLAIN statements.
    pub plan: Option<serde_json::Value>,

    /// When set, connecting fails with this message.
    pub connect_error: Option<String>,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            row_count: 1,
            failing_statements: Vec::new(),
            delay: None,
            plan: None,
            connect_error: None,
        }
    }
}

impl MockBehavior {
    /// Sets the number of rows returned for queries.
    pub fn with_rows(mut self, row_count: usize) -> Self {
        self.row_count = row_count;
        self
    }

    /// Makes statements containing `fragment` fail.
    pub fn failing_on(mut self, fragment: impl Into<String>) -> Self {
        self.failing_statements.push(fragment.into().to_uppercase());
        self
    }

    /// Delays every statement by `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Sets the plan document returned for EXPLAIN statements.
    pub fn with_plan(mut self, plan: serde_json::Value) -> Self {
        self.plan = Some(plan);
        self
    }

    /// Makes every connect attempt fail.
    pub fn failing_connect(mut self, message: impl Into<String>) -> Self {
        self.connect_error = Some(message.into());
        self
    }

    fn fails(&self, sql: &str) -> bool {
        let upper = sql.to_uppercase();
        self.failing_statements
            .iter()
            .any(|fragment| upper.contains(&fragment.to_uppercase()))
    }
}

/// A mock database client that answers from its [`MockBehavior`].
#[derive(Debug)]
pub struct MockDatabaseClient {
    dialect: Dialect,
    behavior: MockBehavior,
    log: Arc<MockCallLog>,
    closed: AtomicBool,
}

impl MockDatabaseClient {
    /// Creates a standalone mock client with default behavior.
    pub fn new(dialect: Dialect) -> Self {
        Self::with_behavior(dialect, MockBehavior::default(), Arc::default())
    }

    /// Creates a mock client recording into `log`.
    pub fn with_behavior(dialect: Dialect, behavior: MockBehavior, log: Arc<MockCallLog>) -> Self {
        Self {
            dialect,
            behavior,
            log,
            closed: AtomicBool::new(false),
        }
    }

    fn answer(&self, sql: &str) -> QueryResult {
        let upper = sql.trim_start().to_uppercase();

        if upper.starts_with("EXPLAIN") {
            let plan = match &self.behavior.plan {
                Some(plan) => Value::Json(plan.clone()),
                None => Value::String(format!("mock plan for: {sql}")),
            };
            return QueryResult::with_data(vec![ColumnInfo::new("QUERY PLAN", "json")], vec![vec![plan]]);
        }

        if upper.starts_with("SELECT") || upper.starts_with("WITH") {
            let columns = vec![ColumnInfo::new("id", "int8"), ColumnInfo::new("name", "text")];
            let rows: Vec<Row> = (0..self.behavior.row_count)
                .map(|i| vec![Value::Int(i as i64 + 1), Value::String(format!("row {}", i + 1))])
                .collect();
            return QueryResult::with_data(columns, rows);
        }

        QueryResult::new()
    }
}

#[async_trait]
impl DatabaseClient for MockDatabaseClient {
    fn dialect(&self) -> Dialect {
        self.dialect
    }

    async fn execute_raw(&self, sql: &str) -> Result<QueryResult> {
        self.log.statements.lock().push(sql.to_string());

        if self.closed.load(Ordering::SeqCst) {
            return Err(ValidatorError::query("Connection is closed"));
        }

        if let Some(delay) = self.behavior.delay {
            tokio::time::sleep(delay).await;
        }

        if self.behavior.fails(sql) {
            return Err(ValidatorError::query(format!("ERROR: mock failure for: {sql}")));
        }

        Ok(self.answer(sql))
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.log.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Connector producing [`MockDatabaseClient`]s that share one call log.
#[derive(Debug, Default)]
pub struct MockConnector {
    behavior: MockBehavior,
    log: Arc<MockCallLog>,
}

impl MockConnector {
    /// Creates a connector with default behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a connector whose clients follow `behavior`.
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            log: Arc::default(),
        }
    }

    /// Returns the call log shared by every client from this connector.
    pub fn log(&self) -> Arc<MockCallLog> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>> {
        if let Some(message) = &self.behavior.connect_error {
            return Err(ValidatorError::connection(message.clone()));
        }

        self.log.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockDatabaseClient::with_behavior(
            descriptor.dialect,
            self.behavior.clone(),
            self.log(),
        )))
    }
}

/// Connector that always fails to connect.
#[derive(Debug, Clone)]
pub struct FailingConnector {
    message: String,
}

impl FailingConnector {
    /// Creates a connector failing with `message`.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl Connector for FailingConnector {
    async fn connect(&self, descriptor: &ConnectionDescriptor) -> Result<Box<dyn DatabaseClient>> {
        Err(ValidatorError::connection(format!(
            "{} ({})",
            self.message,
            descriptor.display_string()
        )))
    }
}
