//! sqlvet - multi-dialect SQL validation.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use db_sqlvet::cli::{Cli, Command};
use db_sqlvet::config::Config;
use db_sqlvet::connection::ConnectionManager;
use db_sqlvet::db::{supported_dialects, MockConnector};
use db_sqlvet::logging;
use db_sqlvet::validation::{validate_request, ApiResponse, ConnectionTestResult};
use serde::Serialize;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_args();

    match &cli.log_file {
        Some(path) => {
            if let Err(e) = logging::init_file_logging(path) {
                eprintln!("Warning: Could not create log file {}: {e}", path.display());
                logging::init_stderr_logging();
            }
        }
        None => logging::init_stderr_logging(),
    }

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Runs the selected command and prints its envelope. Returns the
/// envelope's success flag.
async fn run(cli: Cli) -> anyhow::Result<bool> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let manager = Arc::new(if cli.mock_db {
        ConnectionManager::with_connector(Arc::new(MockConnector::new()))
    } else {
        ConnectionManager::new()
    });

    let success = match &cli.command {
        Command::Validate(args) => {
            let defaults = args.options.apply(config.defaults);
            let result = match args.to_request(&config) {
                Ok(request) => validate_request(Arc::clone(&manager), &request, defaults).await,
                Err(e) => Err(e),
            };
            emit(&ApiResponse::from_result(result, "SQL validation failed"), cli.pretty)?
        }
        Command::TestConnection(args) => {
            let result = match args.resolve(&config) {
                Ok(descriptor) => Ok(ConnectionTestResult {
                    connected: manager.test_connection(&descriptor).await,
                    dialect: descriptor.dialect,
                    database: descriptor.database,
                }),
                Err(e) => Err(e),
            };
            emit(&ApiResponse::from_result(result, "Connection test failed"), cli.pretty)?
        }
        Command::Dialects => emit(&ApiResponse::ok(supported_dialects()), cli.pretty)?,
    };

    manager.close_all_connections().await;
    Ok(success)
}

fn emit<T: Serialize>(response: &ApiResponse<T>, pretty: bool) -> anyhow::Result<bool> {
    let json = if pretty {
        serde_json::to_string_pretty(response)
    } else {
        serde_json::to_string(response)
    }
    .context("Failed to serialize response")?;

    println!("{json}");
    Ok(response.success)
}
