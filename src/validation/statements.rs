//! Dialect-specific statements sent during validation.

use crate::db::Dialect;
use once_cell::sync::Lazy;
use regex::Regex;

static LEADING_SELECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\s*)SELECT(\s+DISTINCT)?\b").expect("valid leading SELECT pattern")
});

/// The statements that make up one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialectStatements {
    /// One statement whose result is the answer.
    Single(String),

    /// SQL Server SHOWPLAN session toggle around the statement. Each part
    /// is sent as its own batch, since SET SHOWPLAN must be alone in one.
    Showplan {
        enable: String,
        statement: String,
        disable: String,
    },
}

impl DialectStatements {
    fn showplan(option: &str, sql: &str) -> Self {
        Self::Showplan {
            enable: format!("SET {option} ON"),
            statement: sql.to_string(),
            disable: format!("SET {option} OFF"),
        }
    }
}

/// Statements that make the database compile `sql` without running it.
pub fn syntax_statements(dialect: Dialect, sql: &str) -> DialectStatements {
    match dialect {
        Dialect::Postgres => DialectStatements::Single(format!("EXPLAIN (FORMAT JSON) {sql}")),
        Dialect::Mysql => DialectStatements::Single(format!("EXPLAIN {sql}")),
        Dialect::Sqlite => DialectStatements::Single(format!("EXPLAIN QUERY PLAN {sql}")),
        Dialect::Mssql => DialectStatements::showplan("SHOWPLAN_ALL", sql),
    }
}

/// Statements that retrieve the execution plan for `sql`.
///
/// On Postgres this runs the statement (`ANALYZE`).
pub fn plan_statements(dialect: Dialect, sql: &str) -> DialectStatements {
    match dialect {
        Dialect::Postgres => {
            DialectStatements::Single(format!("EXPLAIN (ANALYZE, BUFFERS, FORMAT JSON) {sql}"))
        }
        Dialect::Mysql => DialectStatements::Single(format!("EXPLAIN FORMAT=JSON {sql}")),
        Dialect::Sqlite => DialectStatements::Single(format!("EXPLAIN QUERY PLAN {sql}")),
        Dialect::Mssql => DialectStatements::showplan("SHOWPLAN_XML", sql),
    }
}

/// Bounds `sql` to `max_rows` rows.
///
/// Text already mentioning `LIMIT` or `TOP` anywhere is returned unchanged.
/// SQL Server only rewrites a leading `SELECT`; other statements pass through.
pub fn add_row_limit(dialect: Dialect, sql: &str, max_rows: usize) -> String {
    let upper = sql.to_uppercase();
    if upper.contains("LIMIT") || upper.contains("TOP") {
        return sql.to_string();
    }

    match dialect {
        Dialect::Postgres | Dialect::Mysql | Dialect::Sqlite => {
            let body = sql.trim_end().trim_end_matches(';').trim_end();
            // On its own line so a trailing `--` comment cannot swallow it.
            format!("{body}\nLIMIT {max_rows}")
        }
        Dialect::Mssql => LEADING_SELECT
            .replace(sql, |caps: &regex::Captures| {
                format!(
                    "{}SELECT{} TOP {}",
                    &caps[1],
                    caps.get(2).map_or("", |m| m.as_str()),
                    max_rows
                )
            })
            .into_owned(),
    }
}
