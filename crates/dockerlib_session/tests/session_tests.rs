//! Integration tests for the container session.
//!
//! These tests drive a full session against the mock engine to avoid
//! requiring a Docker daemon.

use std::sync::Arc;

use dockerlib_session::{
    ContainerSession, EngineConnection, MockEngine, MockExec, MockRun, OptionSet, RunArgs,
    RunOutput, SessionError,
};

fn session_for(engine: &MockEngine) -> ContainerSession {
    let connection = EngineConnection::with_client(Arc::new(engine.clone()));
    ContainerSession::new(Arc::new(connection))
}

/// Pull alpine, run `echo hi` through a bash entrypoint in the foreground.
#[tokio::test]
async fn test_foreground_entrypoint_run_returns_decoded_output() {
    let engine = MockEngine::new().add_run(MockRun::Output("hi\n".into()));
    let mut session = session_for(&engine);

    let image = session.pull_image("alpine", "3.18").await.unwrap();
    assert_eq!(image.reference(), "alpine:3.18");

    let output = session
        .run_by_entrypoint(
            "bash",
            RunArgs::new().command("-c 'echo hi'"),
            Some(OptionSet::new().with("detach", false)),
        )
        .await
        .unwrap();

    assert_eq!(output, RunOutput::Text("hi\n".into()));
    assert!(session.current_container().is_none());
}

/// A detached run without a name derives the name and is reused by exec.
#[tokio::test]
async fn test_detached_run_then_exec_uses_stored_container() {
    let engine = MockEngine::new().add_exec(MockExec::success("bin\ndev\netc\n"));
    let mut session = session_for(&engine);
    session.set_options(true, OptionSet::new().with("detach", true));

    let output = session
        .run(RunArgs::new().image("alpine:3.18"))
        .await
        .unwrap();
    let container = output.container().cloned().unwrap();
    assert_eq!(session.container_name(), Some(container.name.as_str()));

    let result = session.exec_in_container("ls /", None, None).await.unwrap();
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.output, "bin\ndev\netc\n");

    let exec_calls = engine.get_method_calls("exec");
    assert_eq!(exec_calls.len(), 1);
    assert_eq!(exec_calls[0].target.as_deref(), Some(container.name.as_str()));
    assert!(!engine.was_called("get_container"));
}

/// A name conflict on create surfaces as CreateConflict with the daemon text.
#[tokio::test]
async fn test_conflict_surfaces_as_create_conflict() {
    let engine = MockEngine::new().add_container("web", "");
    let mut session = session_for(&engine);
    session.set_container_name("web");
    session.set_options(true, OptionSet::new().with("detach", true));

    let err = session
        .run(RunArgs::new().image("nginx:1.25"))
        .await
        .unwrap_err();

    match err {
        SessionError::CreateConflict {
            message,
            status_code,
        } => {
            assert_eq!(status_code, 409);
            assert!(message.contains("\"/web\" is already in use"));
        }
        other => panic!("Expected CreateConflict, got {:?}", other),
    }
}

/// Exec with nothing tracked and nothing named reports "not assigned".
#[tokio::test]
async fn test_exec_without_any_container_is_not_assigned() {
    let engine = MockEngine::new();
    let mut session = session_for(&engine);

    let err = session.exec_in_container("ls /", None, None).await.unwrap_err();

    assert!(matches!(
        err,
        SessionError::ContainerNotFound {
            name: None,
            id: None
        }
    ));
    assert_eq!(
        err.to_string(),
        "Docker Container Object has not been assigned."
    );
    assert!(!engine.was_called("exec"));
}

/// Remove mode prunes volumes and resets, tracked container or not.
#[tokio::test]
async fn test_clean_in_remove_mode_prunes_and_resets() {
    let engine = MockEngine::new().add_volume("dangling");
    let mut session = session_for(&engine);
    session.set_options(
        true,
        OptionSet::new().with("detach", true).with("remove", true),
    );
    let container = session
        .run(RunArgs::new().image("alpine:3.18"))
        .await
        .unwrap()
        .container()
        .cloned()
        .unwrap();

    session.clean_container().await.unwrap();

    assert!(engine.was_called("prune_volumes"));
    assert!(!engine.was_called("stop_container"));
    assert!(!engine.container_exists(&container.name));
    assert!(session.current_container().is_none());
    assert!(session.container_name().is_none());
    assert!(session.options().is_empty());

    // Nothing tracked at all: still prunes.
    session.set_options(true, OptionSet::new().with("remove", true));
    engine.clear_calls();
    session.clean_container().await.unwrap();
    assert!(engine.was_called("prune_volumes"));
    assert!(!engine.was_called("remove_container"));
}

/// Without remove mode the container is stopped, then force-removed.
#[tokio::test]
async fn test_clean_stops_and_removes_container() {
    let engine = MockEngine::new();
    let mut session = session_for(&engine);
    session.set_container_name("worker");
    session.set_options(true, OptionSet::new().with("detach", true));
    session
        .run(RunArgs::new().image("alpine:3.18"))
        .await
        .unwrap();
    assert!(engine.is_running("worker"));

    session.clean_container().await.unwrap();

    let methods: Vec<String> = engine
        .get_calls()
        .into_iter()
        .map(|c| c.method)
        .filter(|m| m.ends_with("_container") && m != "run_container")
        .collect();
    assert_eq!(methods, vec!["stop_container", "remove_container"]);
    assert!(!engine.container_exists("worker"));
    assert!(!engine.was_called("prune_volumes"));
    assert!(session.current_container().is_none());
}

/// Cleanup finds a container started elsewhere by its name.
#[tokio::test]
async fn test_clean_resolves_container_by_name() {
    let engine = MockEngine::new().add_container("leftover", "");
    let mut session = session_for(&engine);
    session.set_container_name("leftover");

    session.clean_container().await.unwrap();

    assert_eq!(engine.get_method_calls("get_container").len(), 1);
    assert!(!engine.container_exists("leftover"));
}

/// The tracked handle is returned without asking the daemon; after cleanup
/// a detached lookup asks exactly once.
#[tokio::test]
async fn test_resolve_current_container_round_trip() {
    let engine = MockEngine::new();
    let mut session = session_for(&engine);
    session.set_container_name("svc");

    let first = session
        .run_by_entrypoint(
            "bash",
            RunArgs::new().image("alpine:3.18"),
            Some(OptionSet::new().with("detach", true).with("remove", true)),
        )
        .await
        .unwrap()
        .container()
        .cloned()
        .unwrap();

    let resolved = session.resolve_current_container(None).await.unwrap();
    assert_eq!(resolved, Some(first));
    assert!(!engine.was_called("get_container"));

    session.clean_container().await.unwrap();
    assert!(session.current_container().is_none());

    // Another session starts a container under the same name.
    let mut other = session_for(&engine);
    other.set_container_name("svc");
    other.set_options(true, OptionSet::new().with("detach", true));
    let started = other
        .run(RunArgs::new().image("alpine:3.18"))
        .await
        .unwrap()
        .container()
        .cloned()
        .unwrap();

    session.set_options(true, OptionSet::new().with("detach", true));
    let resolved = session.resolve_current_container(Some("svc")).await.unwrap();
    assert_eq!(resolved, Some(started));
    assert_eq!(engine.get_method_calls("get_container").len(), 1);
}

/// A failing foreground command on the entrypoint path yields its logs.
#[tokio::test]
async fn test_entrypoint_runtime_failure_yields_logs() {
    let engine = MockEngine::new().add_run(MockRun::RuntimeFailure {
        exit_code: 127,
        logs: "bash: line 1: missing: command not found\n".into(),
    });
    let mut session = session_for(&engine);
    session.pull_image("ubuntu", "22.04").await.unwrap();

    let output = session
        .run_by_entrypoint("bash", RunArgs::new().command("-c missing"), None)
        .await
        .unwrap();

    assert_eq!(
        output.text(),
        Some("bash: line 1: missing: command not found\n")
    );
    let logs = session.fetch_logs(false).await.unwrap();
    assert_eq!(logs, "bash: line 1: missing: command not found\n");
}

/// Capture with an explicit container skips creating a new one.
#[tokio::test]
async fn test_capture_with_explicit_container() {
    let engine = MockEngine::new()
        .add_exec(MockExec::failure(2, "ls: cannot access '/nope'\n"));
    let mut session = session_for(&engine);

    session.pull_image("alpine", "3.18").await.unwrap();
    let container = session
        .run_by_bash_detached(None, Vec::new(), None)
        .await
        .unwrap();
    engine.clear_calls();

    let result = session
        .run_bash_and_capture("ls /nope", RunArgs::new(), Some(container), None)
        .await
        .unwrap();

    assert!(!result.success());
    assert_eq!(result.exit_code, 2);
    assert!(!engine.was_called("run_container"));
}

/// Daemon errors other than conflicts pass through untouched.
#[tokio::test]
async fn test_engine_errors_propagate() {
    let engine = MockEngine::new().fail_with("pull_image", 404, "manifest unknown");
    let mut session = session_for(&engine);

    let err = session.pull_image("nope", "latest").await.unwrap_err();
    assert!(err.to_string().contains("manifest unknown"));
    assert!(session.image().is_none());
}

/// The pulled image survives cleanup so a new container can start from it.
#[tokio::test]
async fn test_image_survives_cleanup() -> anyhow::Result<()> {
    let engine = MockEngine::new();
    let mut session = session_for(&engine);

    session.init_environment("first", "alpine", "3.18").await?;
    session.run_by_bash_detached(None, Vec::new(), None).await?;
    session.clean_container().await?;

    assert_eq!(session.image().map(|i| i.reference()), Some("alpine:3.18".to_string()));
    let second = session.run_by_bash_detached(None, Vec::new(), None).await?;
    assert_ne!(second.name, "first");
    Ok(())
}
