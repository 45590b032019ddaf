//! Validation executor.
//!
//! A `SqlExecutor` owns one connection from the [`ConnectionManager`] and
//! walks a statement through the validation stages in order, stopping at
//! the first fatal outcome. Plan and sample failures are recorded as
//! warnings and never invalidate a statement that passed the gate and
//! the syntax check.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{
    add_row_limit, analyze_metadata, plan_cost, plan_statements, syntax_statements,
    DialectStatements, ExecutionPlan, SampleResults, SyntaxCheck, ValidationResult,
    ValidationStage,
};
use crate::config::{ConnectionDescriptor, ExecutionOptions, ValidationRequest};
use crate::connection::{ConnectionId, ConnectionManager};
use crate::db::QueryResult;
use crate::error::{Result, ValidatorError};
use crate::safety::analyze_sql_security;

/// Runs validation for one connection descriptor.
pub struct SqlExecutor {
    manager: Arc<ConnectionManager>,
    descriptor: ConnectionDescriptor,
    options: ExecutionOptions,
    connection_id: Option<ConnectionId>,
    stage: ValidationStage,
}

impl SqlExecutor {
    /// Creates an executor; options are clamped to their allowed ranges.
    pub fn new(
        manager: Arc<ConnectionManager>,
        descriptor: ConnectionDescriptor,
        options: ExecutionOptions,
    ) -> Self {
        Self {
            manager,
            descriptor,
            options: options.clamped(),
            connection_id: None,
            stage: ValidationStage::Uninitialized,
        }
    }

    /// Furthest stage reached by the last run.
    pub fn stage(&self) -> ValidationStage {
        self.stage
    }

    /// Effective options.
    pub fn options(&self) -> ExecutionOptions {
        self.options
    }

    /// Id of the owned connection, if any.
    pub fn connection_id(&self) -> Option<&str> {
        self.connection_id.as_deref()
    }

    /// Opens the connection. Failure is fatal for the request.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.connection_id.is_some() {
            return Ok(());
        }

        let id = self.manager.create_connection(&self.descriptor).await?;
        self.connection_id = Some(id);
        self.stage = ValidationStage::Connected;
        Ok(())
    }

    /// Validates one statement.
    ///
    /// Never fails: every outcome, including a blocked statement or a
    /// syntax error, is reported in the returned result.
    pub async fn validate_sql(&mut self, sql: &str) -> ValidationResult {
        let readonly = self.options.readonly;
        let mut result = ValidationResult {
            security_check: analyze_sql_security(sql, readonly),
            ..Default::default()
        };
        self.stage = ValidationStage::SecurityChecked;

        if !result.security_check.passes(readonly) {
            info!(
                "Statement rejected by security gate (blocked: {:?})",
                result.security_check.blocked_operations
            );
            return self.finalize(result);
        }

        let Some(id) = self.connection_id.clone() else {
            result.syntax_check = SyntaxCheck::invalid("connection not initialized");
            return self.finalize(result);
        };

        result.syntax_check = self.check_syntax(&id, sql).await;
        self.stage = ValidationStage::SyntaxChecked;
        if !result.syntax_check.valid {
            return self.finalize(result);
        }

        if self.options.explain {
            result.execution_plan = Some(self.execution_plan(&id, sql).await);
        }
        self.stage = ValidationStage::PlanAttempted;

        match self.sample(&id, sql).await {
            Ok(sample) => result.sample_results = Some(sample),
            Err(e) => {
                warn!("Sample execution failed: {}", e);
                result.sample_results = Some(SampleResults::default());
                result
                    .security_check
                    .warnings
                    .push(format!("Sample execution failed: {}", detail(&e)));
            }
        }
        self.stage = ValidationStage::SampleAttempted;

        let plan = result
            .execution_plan
            .as_ref()
            .and_then(|execution_plan| execution_plan.plan.as_ref());
        result.metadata = Some(analyze_metadata(sql, plan));
        self.stage = ValidationStage::MetadataAnnotated;

        result.is_valid = true;
        self.finalize(result)
    }

    /// Releases the connection. Safe to call more than once.
    pub async fn cleanup(&mut self) {
        if let Some(id) = self.connection_id.take() {
            self.manager.close_connection(&id).await;
        }
    }

    fn finalize(&mut self, result: ValidationResult) -> ValidationResult {
        self.stage = ValidationStage::Finalized;
        debug!("Validation finished (valid: {})", result.is_valid);
        result
    }

    async fn check_syntax(&self, id: &str, sql: &str) -> SyntaxCheck {
        match self.run(id, syntax_statements(self.descriptor.dialect, sql)).await {
            Ok(_) => SyntaxCheck::valid(),
            Err(e) => {
                debug!("Syntax check failed: {}", e);
                SyntaxCheck::invalid(detail(&e))
            }
        }
    }

    async fn execution_plan(&self, id: &str, sql: &str) -> ExecutionPlan {
        match self.run(id, plan_statements(self.descriptor.dialect, sql)).await {
            Ok(plan) => ExecutionPlan {
                cost: plan_cost(&plan),
                warnings: plan.truncation_warning().into_iter().collect(),
                plan: Some(plan),
            },
            Err(e) => {
                warn!("Execution plan unavailable: {}", e);
                ExecutionPlan {
                    plan: None,
                    cost: None,
                    warnings: vec![format!("Execution plan unavailable: {}", detail(&e))],
                }
            }
        }
    }

    async fn sample(&self, id: &str, sql: &str) -> Result<SampleResults> {
        let limited = add_row_limit(self.descriptor.dialect, sql, self.options.max_rows);

        let start = Instant::now();
        let result = self.query(id, &limited).await?;
        let execution_time = start.elapsed().as_millis() as u64;

        Ok(SampleResults {
            columns: result.columns,
            total_rows: Some(result.row_count),
            rows: result.rows,
            execution_time,
        })
    }

    async fn run(&self, id: &str, statements: DialectStatements) -> Result<QueryResult> {
        match statements {
            DialectStatements::Single(sql) => self.query(id, &sql).await,
            DialectStatements::Showplan {
                enable,
                statement,
                disable,
            } => {
                self.query(id, &enable).await?;
                let outcome = self.query(id, &statement).await;
                if let Err(e) = self.query(id, &disable).await {
                    warn!("Failed to reset showplan mode: {}", e);
                }
                outcome
            }
        }
    }

    async fn query(&self, id: &str, sql: &str) -> Result<QueryResult> {
        self.manager
            .execute_query(id, sql, self.options.query_options())
            .await
    }
}

impl Drop for SqlExecutor {
    fn drop(&mut self) {
        let Some(id) = self.connection_id.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let manager = Arc::clone(&self.manager);
                handle.spawn(async move {
                    manager.close_connection(&id).await;
                });
            }
            Err(_) => warn!("Executor dropped outside a runtime; connection {} not closed", id),
        }
    }
}

/// Driver message without the error category prefix.
fn detail(error: &ValidatorError) -> String {
    match error {
        ValidatorError::Query(message) | ValidatorError::Connection(message) => message.clone(),
        other => other.to_string(),
    }
}

/// Validates a request end to end: initialize, validate, cleanup.
///
/// The connection is released on every exit path.
pub async fn validate_request(
    manager: Arc<ConnectionManager>,
    request: &ValidationRequest,
    defaults: ExecutionOptions,
) -> Result<ValidationResult> {
    request.validate()?;

    let options = request.effective_options(defaults);
    let mut executor = SqlExecutor::new(manager, request.connection.clone(), options);

    let outcome = match executor.initialize().await {
        Ok(()) => Ok(executor.validate_sql(&request.sql).await),
        Err(e) => Err(e),
    };

    executor.cleanup().await;
    outcome
}
