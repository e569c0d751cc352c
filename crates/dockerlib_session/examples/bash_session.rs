//! Example: Driving a bash container through a session
//!
//! This example pulls an image, starts a detached bash container, runs a few
//! commands inside it and cleans up afterwards.
//!
//! Run with: cargo run --example bash_session

use std::sync::Arc;

use dockerlib_session::{ContainerSession, EngineConnection, OptionSet, RunArgs};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("=== dockerlib Session Example ===\n");

    let connection = Arc::new(EngineConnection::from_env());
    let mut session = ContainerSession::new(connection);

    if let Err(e) = session.init_environment("dockerlib-example", "ubuntu", "22.04").await {
        println!("Docker not available: {}", e);
        return Ok(());
    }

    println!("Method 1: One-shot foreground run");
    println!("---------------------------------");
    let output = session
        .run_by_entrypoint(
            "bash",
            RunArgs::new().command("-c 'uname -a'"),
            Some(OptionSet::new().with("detach", false).with("remove", true)),
        )
        .await?;
    println!("{}", output.text().unwrap_or_default());

    println!("\nMethod 2: Detached container with exec");
    println!("--------------------------------------");
    session.refresh_options(OptionSet::new());
    let container = session
        .run_by_bash_detached(None, Vec::new(), None)
        .await?;
    println!("Started {}", container);

    for command in ["cat /etc/os-release", "ls /nonexistent"] {
        let result = session
            .run_bash_and_capture(command, RunArgs::new(), Some(container.clone()), None)
            .await?;
        println!("$ {} (exit {})", command, result.exit_code);
        print!("{}", result.output);
    }

    session.clean_container().await?;
    println!("\nCleaned up.");

    Ok(())
}
