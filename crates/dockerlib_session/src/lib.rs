//! # dockerlib_session
//!
//! Stateful container session for test suites.
//!
//! This crate drives a Docker daemon through the life of one test
//! container: pull the image, run or start it, execute commands inside it,
//! collect output and logs, then stop and clean up.
//!
//! # Features
//!
//! - **Session State**: Remembers the image, container name and current container
//! - **Option Sets**: `detach`, `tty`, `stdin_open`, `remove` run flags, merged or replaced
//! - **Uniform Output**: Buffers and chunk streams both come back as one string
//! - **Domain Errors**: Name conflicts and missing containers map to typed errors
//! - **Keywords**: Named keyword dispatch for test-framework adapters
//! - **Mock Engine**: For testing without a Docker daemon
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use dockerlib_session::{ContainerSession, EngineConnection, RunArgs};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let connection = Arc::new(EngineConnection::from_env());
//!     let mut session = ContainerSession::new(connection);
//!
//!     session.init_environment("smoke", "ubuntu", "22.04").await?;
//!
//!     let result = session
//!         .run_bash_and_capture("cat /etc/os-release", RunArgs::new(), None, None)
//!         .await?;
//!     println!("Exit code: {}", result.exit_code);
//!
//!     session.clean_container().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod docker;
pub mod engine;
pub mod error;
pub mod keywords;
pub mod mock;
pub mod options;
pub mod output;
pub mod session;
pub mod translate;

pub use config::{CommandLine, ConnectionConfig, Environment, RunArgs};
pub use connection::EngineConnection;
pub use docker::DockerEngine;
pub use engine::{
    ContainerHandle, ContainerSummary, EngineClient, ExecOutput, ExecRequest, ImageRef,
    RunOutcome, RunRequest,
};
pub use error::{
    EngineError, EngineResult, KeywordError, KeywordResult, SessionError, SessionResult,
};
pub use keywords::{Keyword, KeywordLibrary, KeywordValue};
pub use mock::{CapturedCall, MockEngine, MockExec, MockRun};
pub use options::{ExecOption, OptionSet, OptionValue, RunOption};
pub use output::{normalize, ChunkStream, EngineOutput};
pub use session::{ContainerSession, ExecResult, RunOutput, BASH_ENTRYPOINT};
