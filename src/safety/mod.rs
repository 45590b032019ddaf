//! Query safety analysis module.
//!
//! Classifies SQL text against ordered dangerous-operation and read-only
//! signatures to decide whether a statement may reach a live database.
//! This is pattern matching over the literal text, not parsing.

mod analyzer;

pub use analyzer::{analyze_sql_security, safety_gate, SecurityAnalyzer};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a dangerous-operation signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationCategory {
    /// Schema changes (DROP, CREATE, ALTER, TRUNCATE).
    Ddl,
    /// Data modification (DELETE, UPDATE, INSERT).
    Dml,
    /// Privilege changes (GRANT, REVOKE).
    Privilege,
    /// Procedure invocation (EXEC, EXECUTE, CALL).
    Procedural,
    /// Server-side file access (LOAD DATA, INTO OUTFILE, INTO DUMPFILE).
    FileIo,
    /// Deliberate delays (SLEEP, BENCHMARK, WAITFOR DELAY).
    Timing,
}

impl fmt::Display for OperationCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ddl => write!(f, "DDL"),
            Self::Dml => write!(f, "DML"),
            Self::Privilege => write!(f, "privilege"),
            Self::Procedural => write!(f, "procedural"),
            Self::FileIo => write!(f, "file I/O"),
            Self::Timing => write!(f, "timing"),
        }
    }
}

/// Outcome of analyzing a SQL statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityCheck {
    /// True when the text matches a read-only signature and no dangerous one.
    pub is_read_only: bool,
    /// Human-readable warnings, in detection order.
    pub warnings: Vec<String>,
    /// Literal text of every matched dangerous signature, in signature order.
    pub blocked_operations: Vec<String>,
}

impl SecurityCheck {
    /// Returns true if any dangerous operation was matched.
    pub fn has_blocked_operations(&self) -> bool {
        !self.blocked_operations.is_empty()
    }

    /// Returns true if the statement may proceed under the given policy.
    pub fn passes(&self, readonly: bool) -> bool {
        !(readonly && !self.is_read_only) && !self.has_blocked_operations()
    }
}
