//! Mock container engine for testing.
//!
//! Provides a scripted, in-memory implementation of the EngineClient trait
//! for use in tests without a running Docker daemon.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::engine::{
    ContainerHandle, ContainerSummary, EngineClient, ExecOutput, ExecRequest, ImageRef,
    RunOutcome, RunRequest,
};
use crate::error::{EngineError, EngineResult};
use crate::options::OptionSet;
use crate::output::EngineOutput;

/// Predefined response for the next container run.
#[derive(Debug, Clone)]
pub enum MockRun {
    /// Foreground run printing `output` and exiting zero.
    Output(String),
    /// Foreground run exiting non-zero; the container logs `logs`.
    RuntimeFailure { exit_code: i64, logs: String },
    /// Daemon rejects the run with an API error.
    ApiError { status_code: u16, message: String },
}

/// Predefined response for an exec call.
#[derive(Debug, Clone)]
pub struct MockExec {
    pub exit_code: i64,
    pub output: String,
}

impl MockExec {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            output: output.into(),
        }
    }

    pub fn failure(exit_code: i64, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: output.into(),
        }
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedCall {
    pub method: String,
    /// Image, container name or lookup key the call targeted.
    pub target: Option<String>,
    pub entrypoint: Option<Vec<String>>,
    pub command: Option<Vec<String>>,
    pub options: Option<OptionSet>,
    pub workdir: Option<String>,
}

impl CapturedCall {
    fn new(method: &str, target: Option<String>) -> Self {
        Self {
            method: method.to_string(),
            target,
            entrypoint: None,
            command: None,
            options: None,
            workdir: None,
        }
    }
}

#[derive(Debug, Clone)]
struct MockContainer {
    handle: ContainerHandle,
    image: String,
    running: bool,
    logs: String,
}

/// Mock container engine for testing.
///
/// Captures every call and answers from scripted responses. Detached runs
/// register containers that later lookups, execs and removals operate on.
#[derive(Clone, Default)]
pub struct MockEngine {
    runs: Arc<RwLock<Vec<MockRun>>>,
    run_index: Arc<AtomicUsize>,
    execs: Arc<RwLock<Vec<MockExec>>>,
    exec_index: Arc<AtomicUsize>,
    containers: Arc<RwLock<HashMap<String, MockContainer>>>,
    volumes: Arc<RwLock<Vec<String>>>,
    failures: Arc<RwLock<HashMap<String, (u16, String)>>>,
    captured_calls: Arc<RwLock<Vec<CapturedCall>>>,
}

impl MockEngine {
    /// Create a new mock engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scripted response for a foreground run.
    pub fn add_run(self, run: MockRun) -> Self {
        self.runs.write().push(run);
        self
    }

    /// Add a scripted exec response.
    pub fn add_exec(self, exec: MockExec) -> Self {
        self.execs.write().push(exec);
        self
    }

    /// Register a container the daemon already knows about.
    pub fn add_container(self, name: impl Into<String>, logs: impl Into<String>) -> Self {
        let name = name.into();
        let container = MockContainer {
            handle: ContainerHandle::new(Uuid::new_v4().simple().to_string(), name.clone()),
            image: "mock:latest".to_string(),
            running: true,
            logs: logs.into(),
        };
        self.containers.write().insert(name, container);
        self
    }

    /// Register a dangling volume that a prune would delete.
    pub fn add_volume(self, name: impl Into<String>) -> Self {
        self.volumes.write().push(name.into());
        self
    }

    /// Make every call to `method` fail with the given API status.
    pub fn fail_with(self, method: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        self.failures
            .write()
            .insert(method.into(), (status_code, message.into()));
        self
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.captured_calls.write().clear();
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedCall> {
        self.captured_calls.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured_calls.read().len()
    }

    /// Check if a specific method was called.
    pub fn was_called(&self, method: &str) -> bool {
        self.captured_calls.read().iter().any(|c| c.method == method)
    }

    /// Get calls to a specific method.
    pub fn get_method_calls(&self, method: &str) -> Vec<CapturedCall> {
        self.captured_calls
            .read()
            .iter()
            .filter(|c| c.method == method)
            .cloned()
            .collect()
    }

    /// Whether the named container is still known and running.
    pub fn is_running(&self, name: &str) -> bool {
        self.containers
            .read()
            .get(name)
            .map(|c| c.running)
            .unwrap_or(false)
    }

    pub fn container_exists(&self, name: &str) -> bool {
        self.containers.read().contains_key(name)
    }

    fn record_call(&self, call: CapturedCall) {
        self.captured_calls.write().push(call);
    }

    fn check_failure(&self, method: &str) -> EngineResult<()> {
        if let Some((status_code, message)) = self.failures.read().get(method).cloned() {
            return Err(EngineError::Api {
                status_code,
                message,
            });
        }
        Ok(())
    }

    fn next_run(&self) -> MockRun {
        let runs = self.runs.read();
        if runs.is_empty() {
            return MockRun::Output(String::new());
        }
        let index = self.run_index.fetch_add(1, Ordering::SeqCst);
        runs[index % runs.len()].clone()
    }

    fn next_exec(&self) -> MockExec {
        let execs = self.execs.read();
        if execs.is_empty() {
            return MockExec::success("");
        }
        let index = self.exec_index.fetch_add(1, Ordering::SeqCst);
        execs[index % execs.len()].clone()
    }

    fn register(&self, request: &RunRequest, running: bool, logs: String) -> EngineResult<ContainerHandle> {
        let id = Uuid::new_v4().simple().to_string();
        let name = request
            .name
            .clone()
            .unwrap_or_else(|| format!("mock_{}", &id[..8]));

        let mut containers = self.containers.write();
        if containers.contains_key(&name) {
            return Err(EngineError::Api {
                status_code: 409,
                message: format!(
                    "Conflict. The container name \"/{}\" is already in use.",
                    name
                ),
            });
        }

        let handle = ContainerHandle::new(id, name.clone());
        containers.insert(
            name,
            MockContainer {
                handle: handle.clone(),
                image: request.image.clone(),
                running,
                logs,
            },
        );
        Ok(handle)
    }

    fn lookup(&self, container: &ContainerHandle) -> EngineResult<MockContainer> {
        self.containers
            .read()
            .get(&container.name)
            .filter(|c| c.handle.id == container.id)
            .cloned()
            .ok_or_else(|| EngineError::Api {
                status_code: 404,
                message: format!("No such container: {}", container.id),
            })
    }
}

#[async_trait]
impl EngineClient for MockEngine {
    async fn pull_image(&self, repository: &str, tag: &str) -> EngineResult<ImageRef> {
        self.record_call(CapturedCall::new(
            "pull_image",
            Some(format!("{}:{}", repository, tag)),
        ));
        self.check_failure("pull_image")?;
        Ok(ImageRef::new(repository, tag).with_id(format!("sha256:{}", Uuid::new_v4().simple())))
    }

    async fn run_container(&self, request: &RunRequest) -> EngineResult<RunOutcome> {
        self.record_call(CapturedCall {
            entrypoint: request.entrypoint.clone(),
            command: request.command.clone(),
            options: Some(request.options.clone()),
            ..CapturedCall::new("run_container", Some(request.image.clone()))
        });
        self.check_failure("run_container")?;

        if request.options.is_detach() {
            let handle = self.register(request, true, String::new())?;
            return Ok(RunOutcome::Detached(handle));
        }

        match self.next_run() {
            MockRun::Output(output) => {
                if !request.options.is_remove() {
                    self.register(request, false, output.clone())?;
                }
                Ok(RunOutcome::Completed(EngineOutput::buffer(output)))
            }
            MockRun::RuntimeFailure { exit_code, logs } => {
                let container = self.register(request, false, logs)?;
                Ok(RunOutcome::RuntimeFailure {
                    container,
                    exit_code,
                })
            }
            MockRun::ApiError {
                status_code,
                message,
            } => Err(EngineError::Api {
                status_code,
                message,
            }),
        }
    }

    async fn get_container(&self, name: &str) -> EngineResult<Option<ContainerHandle>> {
        self.record_call(CapturedCall::new("get_container", Some(name.to_string())));
        self.check_failure("get_container")?;
        Ok(self.containers.read().get(name).map(|c| c.handle.clone()))
    }

    async fn list_containers(&self, all: bool) -> EngineResult<Vec<ContainerSummary>> {
        self.record_call(CapturedCall::new("list_containers", None));
        self.check_failure("list_containers")?;

        let mut summaries: Vec<ContainerSummary> = self
            .containers
            .read()
            .values()
            .filter(|c| all || c.running)
            .map(|c| ContainerSummary {
                handle: c.handle.clone(),
                image: Some(c.image.clone()),
                state: Some(if c.running { "running" } else { "exited" }.to_string()),
                labels: HashMap::new(),
            })
            .collect();
        summaries.sort_by(|a, b| a.handle.name.cmp(&b.handle.name));
        Ok(summaries)
    }

    async fn exec(
        &self,
        container: &ContainerHandle,
        request: &ExecRequest,
    ) -> EngineResult<ExecOutput> {
        self.record_call(CapturedCall {
            command: Some(request.command.clone()),
            options: Some(request.options.clone()),
            workdir: request.workdir.clone(),
            ..CapturedCall::new("exec", Some(container.name.clone()))
        });
        self.check_failure("exec")?;

        let target = self.lookup(container)?;
        if !target.running {
            return Err(EngineError::Api {
                status_code: 409,
                message: format!("Container {} is not running", target.handle.id),
            });
        }

        let response = self.next_exec();
        Ok(ExecOutput {
            exit_code: response.exit_code,
            output: EngineOutput::buffer(response.output),
        })
    }

    async fn logs(&self, container: &ContainerHandle, stream: bool) -> EngineResult<EngineOutput> {
        self.record_call(CapturedCall::new("logs", Some(container.name.clone())));
        self.check_failure("logs")?;

        let logs = self.lookup(container)?.logs;
        if stream {
            let lines: Vec<String> = logs.split_inclusive('\n').map(String::from).collect();
            return Ok(EngineOutput::chunks(lines));
        }
        Ok(EngineOutput::buffer(logs))
    }

    async fn stop_container(&self, container: &ContainerHandle) -> EngineResult<()> {
        self.record_call(CapturedCall::new("stop_container", Some(container.name.clone())));
        self.check_failure("stop_container")?;

        self.lookup(container)?;
        if let Some(c) = self.containers.write().get_mut(&container.name) {
            c.running = false;
        }
        Ok(())
    }

    async fn remove_container(
        &self,
        container: &ContainerHandle,
        force: bool,
        _volumes: bool,
    ) -> EngineResult<()> {
        self.record_call(CapturedCall::new("remove_container", Some(container.name.clone())));
        self.check_failure("remove_container")?;

        let target = self.lookup(container)?;
        if target.running && !force {
            return Err(EngineError::Api {
                status_code: 409,
                message: format!(
                    "You cannot remove a running container {}. Stop the container before attempting removal or force remove",
                    target.handle.id
                ),
            });
        }
        self.containers.write().remove(&container.name);
        Ok(())
    }

    async fn prune_volumes(&self) -> EngineResult<Vec<String>> {
        self.record_call(CapturedCall::new("prune_volumes", None));
        self.check_failure("prune_volumes")?;
        Ok(std::mem::take(&mut *self.volumes.write()))
    }
}
