//! Error types for sqlvet.
//!
//! Security blocks and syntax failures are not errors: they are reported in
//! a [`ValidationResult`](crate::validation::ValidationResult). Only input
//! problems, connection establishment and driver failures surface here.

use thiserror::Error;

/// Main error type for validation operations.
#[derive(Error, Debug)]
pub enum ValidatorError {
    /// Malformed request rejected before any connection is opened.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database connection errors (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// A connection id that is unknown or already closed.
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),

    /// Query execution errors (syntax errors, timeouts, driver failures).
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration errors (invalid config file, bad URL, unknown dialect).
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ValidatorError {
    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a not-found error for the given connection id.
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::ConnectionNotFound(id.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the machine-readable code used in error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::Config(_) => "VALIDATION_ERROR",
            Self::Connection(_) | Self::ConnectionNotFound(_) => "CONNECTION_ERROR",
            Self::Query(_) => "EXECUTION_ERROR",
        }
    }
}

/// Result type alias using ValidatorError.
pub type Result<T> = std::result::Result<T, ValidatorError>;
