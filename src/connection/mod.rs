//! Connection management for sqlvet.
//!
//! Owns every live database connection, keyed by a generated id.

pub mod manager;

pub use manager::{ConnectionId, ConnectionInfo, ConnectionManager};

use std::time::Duration;

/// Deadline and row cap for one query sent through the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// External deadline for the driver call.
    pub timeout: Duration,

    /// Rows kept from the driver's result.
    pub max_rows: usize,
}

impl QueryOptions {
    /// Creates query options.
    pub fn new(timeout: Duration, max_rows: usize) -> Self {
        Self { timeout, max_rows }
    }
}
