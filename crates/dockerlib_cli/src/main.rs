//! dockerlib CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error or failing step
//! - 2: Invalid arguments or suite file
//! - 3: Docker not available

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dockerlib_session::{EngineError, KeywordError, SessionError};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const DOCKER_UNAVAILABLE: u8 = 3;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let directives = log_directives(cli.verbose, cli.quiet, std::env::var("RUST_LOG").ok());

    // Logging may already be initialized
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(EnvFilter::new(directives))
        .try_init();

    let connection = cli.connection_config();

    let result = match cli.command {
        Commands::Run(args) => commands::run::execute(args, connection).await,
        Commands::Keywords(args) => commands::keywords::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Filter directives: `RUST_LOG` when set, otherwise defaults from the flags.
fn log_directives(verbose: bool, quiet: bool, rust_log: Option<String>) -> String {
    if let Some(env) = rust_log.filter(|v| !v.trim().is_empty()) {
        return env;
    }
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    // Target matching is by prefix, so this covers both dockerlib crates.
    format!("dockerlib={},warn", level)
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<KeywordError>() {
            return match err {
                KeywordError::UnknownKeyword(_) | KeywordError::InvalidArguments { .. } => {
                    ExitCodes::INVALID_ARGS
                }
                KeywordError::Session(SessionError::Engine(EngineError::NotAvailable(_))) => {
                    ExitCodes::DOCKER_UNAVAILABLE
                }
                KeywordError::Session(_) => ExitCodes::GENERAL_ERROR,
            };
        }
        if cause.downcast_ref::<serde_yaml::Error>().is_some() {
            return ExitCodes::INVALID_ARGS;
        }
    }
    ExitCodes::GENERAL_ERROR
}
