//! SQL validation for sqlvet.
//!
//! Runs one statement through the security gate, a live syntax check, an
//! optional execution plan, a bounded sample execution and a metadata scan,
//! and reports the outcome as a [`ValidationResult`].

pub mod executor;
mod metadata;
mod response;
mod statements;

pub use executor::{validate_request, SqlExecutor};
pub use metadata::{analyze_metadata, estimate_rows, plan_cost};
pub use response::{ApiResponse, ConnectionTestResult};
pub use statements::{add_row_limit, plan_statements, syntax_statements, DialectStatements};

use crate::db::{ColumnInfo, QueryResult, Row};
use crate::safety::SecurityCheck;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Complete outcome of validating one statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// True only if the security gate and the syntax check both passed.
    pub is_valid: bool,

    pub syntax_check: SyntaxCheck,

    pub security_check: SecurityCheck,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_plan: Option<ExecutionPlan>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_results: Option<SampleResults>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<QueryMetadata>,
}

/// Result of asking the database to compile the statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxCheck {
    pub valid: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyntaxCheck {
    /// A passed syntax check.
    pub fn valid() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    /// A failed syntax check with the database's message.
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// Execution plan as returned by the database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Raw plan rows; `None` when the plan could not be obtained.
    pub plan: Option<QueryResult>,

    /// Estimated total cost from the plan's top node, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,

    #[serde(default)]
    pub warnings: Vec<String>,
}

/// Rows returned by the bounded sample execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleResults {
    pub columns: Vec<ColumnInfo>,

    pub rows: Vec<Row>,

    /// Rows the driver produced before truncation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_rows: Option<usize>,

    /// Wall-clock time of the sample call, in milliseconds.
    pub execution_time: u64,
}

/// Text-derived facts about the statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetadata {
    pub affected_tables: Vec<String>,
    pub estimated_rows: u64,
    pub complexity: Complexity,
}

/// Rough structural complexity of a statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Low,
    Medium,
    High,
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Furthest point an executor has reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValidationStage {
    Uninitialized,
    Connected,
    SecurityChecked,
    SyntaxChecked,
    PlanAttempted,
    SampleAttempted,
    MetadataAnnotated,
    Finalized,
}
