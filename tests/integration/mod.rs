//! Integration tests for sqlvet.

pub mod common;
pub mod live_test;
pub mod manager_test;
pub mod sqlite_test;
