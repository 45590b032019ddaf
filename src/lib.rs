//! sqlvet - multi-dialect SQL validation.
//!
//! This library exposes the core modules for the binary and for
//! integration tests.

pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod logging;
pub mod safety;
pub mod validation;
