//! Signature matching for SQL safety analysis.
//!
//! Signatures are evaluated in a fixed order, case-insensitively, against
//! the raw statement text. The first match of each dangerous signature is
//! reported verbatim as a blocked operation.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{OperationCategory, SecurityCheck};

/// Statements longer than this (in characters) get a length warning.
const MAX_SQL_LENGTH: usize = 10_000;

/// Dangerous-operation signatures, in evaluation order.
const DANGEROUS_SIGNATURES: &[(OperationCategory, &str)] = &[
    (OperationCategory::Ddl, r"DROP\s+(TABLE|DATABASE|SCHEMA|INDEX|VIEW)"),
    (OperationCategory::Ddl, r"CREATE\s+(TABLE|DATABASE|SCHEMA|INDEX|VIEW)"),
    (OperationCategory::Ddl, r"ALTER\s+(TABLE|DATABASE|SCHEMA|INDEX|VIEW)"),
    (OperationCategory::Ddl, r"TRUNCATE\s+TABLE"),
    (OperationCategory::Dml, r"DELETE\s+FROM"),
    (OperationCategory::Dml, r"UPDATE\s+.+\s+SET"),
    (OperationCategory::Dml, r"INSERT\s+INTO"),
    (OperationCategory::Privilege, r"GRANT\s+"),
    (OperationCategory::Privilege, r"REVOKE\s+"),
    (OperationCategory::Procedural, r"EXEC\s+"),
    (OperationCategory::Procedural, r"EXECUTE\s+"),
    (OperationCategory::Procedural, r"CALL\s+"),
    (OperationCategory::FileIo, r"LOAD\s+DATA"),
    (OperationCategory::FileIo, r"INTO\s+OUTFILE"),
    (OperationCategory::FileIo, r"INTO\s+DUMPFILE"),
    (OperationCategory::Timing, r"SLEEP\s*\("),
    (OperationCategory::Timing, r"BENCHMARK\s*\("),
    (OperationCategory::Timing, r"WAITFOR\s+DELAY"),
];

/// Read-only signatures; at least one must match for a read-only verdict.
const READ_ONLY_SIGNATURES: &[&str] = &[
    r"SELECT\s+",
    r"WITH\s+.+\s+SELECT",
    r"EXPLAIN\s+",
    r"DESCRIBE\s+",
    r"SHOW\s+",
    r"PRAGMA\s+",
];

static DEFAULT_ANALYZER: Lazy<SecurityAnalyzer> = Lazy::new(SecurityAnalyzer::new);

static DROP_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bDROP\b").expect("valid DROP keyword pattern"));

#[derive(Debug)]
struct Signature {
    category: OperationCategory,
    pattern: Regex,
}

/// Stateless analyzer holding the compiled signature sets.
#[derive(Debug)]
pub struct SecurityAnalyzer {
    dangerous: Vec<Signature>,
    read_only: Vec<Regex>,
}

impl Default for SecurityAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SecurityAnalyzer {
    /// Compiles the signature sets.
    pub fn new() -> Self {
        let dangerous = DANGEROUS_SIGNATURES
            .iter()
            .map(|(category, pattern)| Signature {
                category: *category,
                pattern: case_insensitive(pattern),
            })
            .collect();
        let read_only = READ_ONLY_SIGNATURES
            .iter()
            .map(|pattern| case_insensitive(pattern))
            .collect();

        Self {
            dangerous,
            read_only,
        }
    }

    /// Analyzes a statement under the given readonly policy.
    pub fn analyze(&self, sql: &str, readonly: bool) -> SecurityCheck {
        let mut warnings = Vec::new();
        let mut blocked_operations = Vec::new();

        for signature in &self.dangerous {
            if let Some(found) = signature.pattern.find(sql) {
                let text = found.as_str().to_string();
                warnings.push(format!(
                    "Dangerous {} operation detected: {}",
                    signature.category, text
                ));
                blocked_operations.push(text);
            }
        }

        let is_read_only = self.matches_read_only(sql) && blocked_operations.is_empty();

        if readonly && !is_read_only {
            warnings.push(
                "SQL contains non-read-only operations while readonly mode is enabled".to_string(),
            );
        }

        if sql.chars().count() > MAX_SQL_LENGTH {
            warnings.push(format!(
                "SQL statement exceeds {MAX_SQL_LENGTH} characters and may carry a performance risk"
            ));
        }

        if (sql.contains("--") || sql.contains("/*")) && DROP_KEYWORD.is_match(sql) {
            warnings.push("SQL contains both comments and DROP; review it carefully".to_string());
        }

        SecurityCheck {
            is_read_only,
            warnings,
            blocked_operations,
        }
    }

    /// Returns true if the statement may proceed to the database.
    ///
    /// False when readonly is required and the text is not read-only, or
    /// when any dangerous signature matched.
    pub fn safety_gate(&self, sql: &str, readonly: bool) -> bool {
        self.analyze(sql, readonly).passes(readonly)
    }

    fn matches_read_only(&self, sql: &str) -> bool {
        self.read_only.iter().any(|pattern| pattern.is_match(sql))
    }
}

fn case_insensitive(pattern: &str) -> Regex {
    Regex::new(&format!("(?i){pattern}")).expect("signature patterns are valid")
}

/// Analyzes SQL with the shared default analyzer.
pub fn analyze_sql_security(sql: &str, readonly: bool) -> SecurityCheck {
    DEFAULT_ANALYZER.analyze(sql, readonly)
}

/// Runs the safety gate with the shared default analyzer.
pub fn safety_gate(sql: &str, readonly: bool) -> bool {
    DEFAULT_ANALYZER.safety_gate(sql, readonly)
}
