//! CLI command definitions.
//!
//! This module defines the command structure for the dockerlib CLI.

use clap::{Parser, Subcommand};

use dockerlib_session::ConnectionConfig;

pub mod keywords;
pub mod run;

/// dockerlib - container session keywords for test suites
#[derive(Parser)]
#[command(name = "dockerlib")]
#[command(version, about = "dockerlib - container session keywords for test suites")]
#[command(long_about = r#"
dockerlib drives a Docker daemon through one container session at a time:
pull an image, run or start a container, execute commands in it, collect
output and logs, then clean up.

COMMANDS:
  run         → Run a YAML suite of keyword steps against one session
  keywords    → List the available keywords

EXIT CODES:
  0 - Success
  1 - General error or failing step
  2 - Invalid arguments or suite file
  3 - Docker not available
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Docker daemon address (defaults to the local socket)
    #[arg(long, global = true, env = "DOCKER_HOST")]
    pub host: Option<String>,

    /// Request timeout in seconds for remote daemons
    #[arg(long, global = true, env = "DOCKERLIB_TIMEOUT")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn connection_config(&self) -> ConnectionConfig {
        let mut config = ConnectionConfig::new();
        if let Some(host) = &self.host {
            config = config.host(host.as_str());
        }
        if let Some(timeout) = self.timeout {
            config = config.timeout(timeout);
        }
        config
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a keyword suite
    Run(run::RunArgs),

    /// List available keywords
    Keywords(keywords::KeywordsArgs),
}
