//! Response envelopes returned at the boundary.

use crate::db::Dialect;
use crate::error::{Result, ValidatorError};
use serde::Serialize;
use uuid::Uuid;

/// Success or error envelope around a payload.
///
/// Success: `{success: true, data, requestId}`.
/// Error: `{success: false, code, message, details, requestId}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,

    pub request_id: String,
}

impl<T> ApiResponse<T> {
    /// Wraps a successful payload.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            code: None,
            message: None,
            details: None,
            request_id: new_request_id(),
        }
    }

    /// Wraps an error; `message` summarizes the failed operation.
    pub fn error(error: &ValidatorError, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            code: Some(error.code()),
            message: Some(message.into()),
            details: Some(error.to_string()),
            request_id: new_request_id(),
        }
    }

    /// Builds the envelope for an operation outcome.
    pub fn from_result(result: Result<T>, failure_message: &str) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::error(&e, failure_message),
        }
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Payload of a connection test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionTestResult {
    pub connected: bool,
    pub dialect: Dialect,
    pub database: String,
}
