//! Metadata derived from statement text and plan documents.

use super::{Complexity, QueryMetadata};
use crate::db::QueryResult;
use once_cell::sync::Lazy;
use regex::Regex;

static TABLE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:FROM|JOIN|UPDATE|INSERT\s+INTO|DELETE\s+FROM)\s+([a-zA-Z_][a-zA-Z0-9_]*)")
        .expect("valid table reference pattern")
});

static HIGH_COMPLEXITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:WITH|WINDOW)\b").expect("valid keyword pattern"));

static MEDIUM_COMPLEXITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:JOIN|UNION)\b").expect("valid keyword pattern"));

/// Scans `sql` for referenced tables and structural complexity.
///
/// `plan` supplies the row estimate when it holds a JSON plan.
pub fn analyze_metadata(sql: &str, plan: Option<&QueryResult>) -> QueryMetadata {
    let mut affected_tables: Vec<String> = Vec::new();
    for caps in TABLE_REFERENCE.captures_iter(sql) {
        let table = &caps[1];
        if !affected_tables.iter().any(|t| t == table) {
            affected_tables.push(table.to_string());
        }
    }

    let complexity = if HIGH_COMPLEXITY.is_match(sql) {
        Complexity::High
    } else if MEDIUM_COMPLEXITY.is_match(sql) {
        Complexity::Medium
    } else {
        Complexity::Low
    };

    QueryMetadata {
        affected_tables,
        estimated_rows: plan.and_then(estimate_rows).unwrap_or(0),
        complexity,
    }
}

/// Row estimate from the top node of a Postgres or MySQL JSON plan.
pub fn estimate_rows(plan: &QueryResult) -> Option<u64> {
    let document = plan_document(plan)?;

    if let Some(rows) = document
        .pointer("/0/Plan/Plan Rows")
        .and_then(serde_json::Value::as_f64)
    {
        return Some(rows.max(0.0) as u64);
    }

    find_key(&document, "rows_examined_per_scan").and_then(as_number).map(|n| n as u64)
}

/// Total cost from the top node of a Postgres or MySQL JSON plan.
pub fn plan_cost(plan: &QueryResult) -> Option<f64> {
    let document = plan_document(plan)?;

    document
        .pointer("/0/Plan/Total Cost")
        .and_then(serde_json::Value::as_f64)
        .or_else(|| {
            document
                .pointer("/query_block/cost_info/query_cost")
                .and_then(as_number)
        })
}

fn plan_document(plan: &QueryResult) -> Option<serde_json::Value> {
    plan.rows.first()?.first()?.as_json()
}

/// Depth-first search for the first occurrence of `key`.
fn find_key<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    match value {
        serde_json::Value::Object(map) => map
            .get(key)
            .or_else(|| map.values().find_map(|v| find_key(v, key))),
        serde_json::Value::Array(items) => items.iter().find_map(|v| find_key(v, key)),
        _ => None,
    }
}

/// MySQL reports some plan numbers as strings.
fn as_number(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}
