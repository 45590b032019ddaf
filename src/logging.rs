//! Logging configuration for sqlvet.
//!
//! Stdout carries only the JSON envelope, so logs go to stderr, or to a
//! file when `--log-file` is given.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Initializes logging to a file.
///
/// The file is truncated on each run to avoid unbounded growth.
pub fn init_file_logging(path: &Path) -> io::Result<()> {
    let log_file = open_log_file(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(log_file)
        .with_ansi(false) // No ANSI colors in file output
        .init();

    Ok(())
}

/// Initializes logging to stderr.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(io::stderr)
        .init();
}

/// Creates the log file, and its parent directory if needed.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
