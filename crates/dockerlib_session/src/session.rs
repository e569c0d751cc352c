//! Stateful container session.
//!
//! A session drives one container at a time through pull, run, exec, logs and
//! cleanup. It remembers the pulled image, the container name, the container it
//! started last and the option set used for runs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{CommandLine, Environment, RunArgs};
use crate::connection::EngineConnection;
use crate::engine::{
    ContainerHandle, ContainerSummary, EngineClient, ExecRequest, ImageRef, RunOutcome,
    RunRequest,
};
use crate::error::{SessionError, SessionResult};
use crate::options::{ExecOption, OptionSet, RunOption};
use crate::output::normalize;
use crate::translate::translate_run_error;

/// Entrypoint used by the bash convenience operations.
pub const BASH_ENTRYPOINT: &str = "bash";

/// Result of a run: captured text for foreground runs, a handle for detached ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutput {
    Text(String),
    Container(ContainerHandle),
}

impl RunOutput {
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Container(_) => None,
        }
    }

    pub fn container(&self) -> Option<&ContainerHandle> {
        match self {
            Self::Container(c) => Some(c),
            Self::Text(_) => None,
        }
    }
}

/// Exit code and decoded output of a command run inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub exit_code: i64,
    pub output: String,
}

impl ExecResult {
    /// Check if the command exited zero.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Stateful wrapper around one engine connection.
pub struct ContainerSession {
    connection: Arc<EngineConnection>,
    client: Option<Arc<dyn EngineClient>>,
    image: Option<ImageRef>,
    container_name: Option<String>,
    current_container: Option<ContainerHandle>,
    options: OptionSet,
}

impl ContainerSession {
    pub fn new(connection: Arc<EngineConnection>) -> Self {
        Self {
            connection,
            client: None,
            image: None,
            container_name: None,
            current_container: None,
            options: OptionSet::new(),
        }
    }

    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    pub fn container_name(&self) -> Option<&str> {
        self.container_name.as_deref()
    }

    pub fn current_container(&self) -> Option<&ContainerHandle> {
        self.current_container.as_ref()
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    /// Engine client, connecting on first use.
    pub async fn client(&mut self) -> SessionResult<Arc<dyn EngineClient>> {
        if let Some(client) = &self.client {
            return Ok(Arc::clone(client));
        }
        let client = self.connection.acquire().await?;
        self.client = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Connect, set the container name and pull `repository:tag`.
    pub async fn init_environment(
        &mut self,
        container_name: &str,
        repository: &str,
        tag: &str,
    ) -> SessionResult<ImageRef> {
        info!(
            "Init docker test environment with container name: {}, test image: {}:{}",
            container_name, repository, tag
        );
        self.client().await?;
        self.set_container_name(container_name);
        self.pull_image(repository, tag).await
    }

    pub fn set_container_name(&mut self, name: impl Into<String>) {
        self.container_name = Some(name.into());
    }

    /// Name of the current container, adopting it as the session's container name.
    pub fn current_container_name(&mut self) -> Option<String> {
        let name = self.current_container.as_ref()?.name.clone();
        self.container_name = Some(name.clone());
        Some(name)
    }

    /// Replace the option set when `used_new_config`, merge into it otherwise.
    pub fn set_options(&mut self, used_new_config: bool, options: OptionSet) {
        self.options.set_options(used_new_config, options);
        debug!("Session options: {:?}", self.options);
    }

    /// Replace the option set.
    pub fn refresh_options(&mut self, options: OptionSet) {
        self.set_options(true, options);
    }

    pub fn is_detach(&self) -> bool {
        self.options.is_detach()
    }

    pub fn is_remove(&self) -> bool {
        self.options.is_remove()
    }

    pub fn is_stream(&self) -> bool {
        self.options.is_stream()
    }

    pub async fn pull_image(&mut self, repository: &str, tag: &str) -> SessionResult<ImageRef> {
        let client = self.client().await?;
        let image = client.pull_image(repository, tag).await?;
        self.image = Some(image.clone());
        Ok(image)
    }

    /// Look up the container this session operates on.
    ///
    /// Returns the tracked container if there is one. Otherwise, and only in
    /// detached mode, asks the daemon for `name`. Returns `None` when nothing
    /// can be resolved; callers decide whether that is an error.
    pub async fn resolve_current_container(
        &mut self,
        name: Option<&str>,
    ) -> SessionResult<Option<ContainerHandle>> {
        if let Some(container) = &self.current_container {
            info!("Container: '{}' found.", container.name);
            return Ok(Some(container.clone()));
        }

        if let Some(name) = name {
            if self.is_detach() {
                let client = self.client().await?;
                match client.get_container(name).await? {
                    Some(container) => {
                        info!("Container: '{}' found.", name);
                        self.current_container = Some(container);
                        return Ok(self.current_container.clone());
                    }
                    None => warn!("Container: '{}' not found.", name),
                }
                return Ok(None);
            }
        }

        match &self.container_name {
            Some(name) => warn!("Container: '{}' not found.", name),
            None => warn!("No container name provided."),
        }
        Ok(None)
    }

    /// Explicit image if given, else the pulled session image.
    fn image_reference(&self, image: Option<String>) -> SessionResult<String> {
        match image {
            Some(image) => Ok(image),
            None => self
                .image
                .as_ref()
                .map(ImageRef::reference)
                .ok_or(SessionError::ImageNotAvailable),
        }
    }

    fn run_request(
        &self,
        entrypoint: Option<Vec<String>>,
        args: RunArgs,
    ) -> SessionResult<RunRequest> {
        Ok(RunRequest {
            image: self.image_reference(args.image)?,
            name: self.container_name.clone(),
            entrypoint,
            command: args.command.as_ref().map(CommandLine::to_args),
            volumes: args.volumes,
            environment: args.environment,
            options: self.options.clone(),
        })
    }

    fn track_detached(&mut self, container: ContainerHandle) -> RunOutput {
        self.current_container = Some(container.clone());
        if self.container_name.is_none() {
            self.current_container_name();
        }
        RunOutput::Container(container)
    }

    /// Run the image with an overridden entrypoint.
    ///
    /// `extra_options`, when given, are merged into the session options first.
    /// A foreground command that exits non-zero is not an error here: the
    /// container is adopted and its logs are returned instead.
    pub async fn run_by_entrypoint(
        &mut self,
        entrypoint: impl Into<CommandLine>,
        args: RunArgs,
        extra_options: Option<OptionSet>,
    ) -> SessionResult<RunOutput> {
        if let Some(extra) = extra_options {
            self.set_options(false, extra);
        }

        let request = self.run_request(Some(entrypoint.into().to_args()), args)?;
        let client = self.client().await?;

        match client
            .run_container(&request)
            .await
            .map_err(translate_run_error)?
        {
            RunOutcome::Completed(output) => Ok(RunOutput::Text(normalize(output).await?)),
            RunOutcome::Detached(container) => Ok(self.track_detached(container)),
            RunOutcome::RuntimeFailure {
                container,
                exit_code,
            } => {
                warn!(
                    "Container '{}' exited with code {}, returning its logs",
                    container.name, exit_code
                );
                self.current_container = Some(container);
                Ok(RunOutput::Text(self.fetch_logs(true).await?))
            }
        }
    }

    /// Start a detached, interactive bash container.
    pub async fn run_by_bash_detached(
        &mut self,
        image: Option<String>,
        volumes: Vec<String>,
        environment: Option<Environment>,
    ) -> SessionResult<ContainerHandle> {
        let args = RunArgs {
            image: Some(self.image_reference(image)?),
            command: None,
            volumes,
            environment,
        };
        let forced = OptionSet::new()
            .with(RunOption::Detach.key(), true)
            .with(RunOption::Interactive.key(), true)
            .with(RunOption::Tty.key(), true);

        match self
            .run_by_entrypoint(BASH_ENTRYPOINT, args, Some(forced))
            .await?
        {
            RunOutput::Container(container) => {
                self.current_container = Some(container.clone());
                Ok(container)
            }
            RunOutput::Text(_) => Err(SessionError::InvalidState(
                "detached bash run returned output instead of a container".into(),
            )),
        }
    }

    /// Run `command` through bash and capture its exit code and output.
    ///
    /// Without an explicit `container` a detached bash container is started
    /// first and left running for the caller to clean up.
    pub async fn run_bash_and_capture(
        &mut self,
        command: impl Into<CommandLine>,
        args: RunArgs,
        container: Option<ContainerHandle>,
        workdir: Option<String>,
    ) -> SessionResult<ExecResult> {
        let container = match container {
            Some(container) => container,
            None => {
                let created = self
                    .run_by_bash_detached(args.image, args.volumes, args.environment)
                    .await?;
                debug!("Container: '{}' created.", created.name);
                created
            }
        };

        self.exec_in_container(command, Some(container), workdir)
            .await
    }

    /// Run the image with its default entrypoint.
    ///
    /// Unlike [`run_by_entrypoint`](Self::run_by_entrypoint), a foreground
    /// command exiting non-zero is reported as [`SessionError::ContainerRuntime`].
    pub async fn run(&mut self, args: RunArgs) -> SessionResult<RunOutput> {
        let request = self.run_request(None, args)?;
        let client = self.client().await?;

        match client
            .run_container(&request)
            .await
            .map_err(translate_run_error)?
        {
            RunOutcome::Completed(output) => Ok(RunOutput::Text(normalize(output).await?)),
            RunOutcome::Detached(container) => Ok(self.track_detached(container)),
            RunOutcome::RuntimeFailure {
                container,
                exit_code,
            } => Err(SessionError::ContainerRuntime {
                container,
                exit_code,
            }),
        }
    }

    /// Execute `command` inside `container`, or the session's container.
    pub async fn exec_in_container(
        &mut self,
        command: impl Into<CommandLine>,
        container: Option<ContainerHandle>,
        workdir: Option<String>,
    ) -> SessionResult<ExecResult> {
        let container = match container {
            Some(container) => container,
            None => {
                let name = self.container_name.clone();
                self.resolve_current_container(name.as_deref())
                    .await?
                    .ok_or_else(|| SessionError::not_found(self.container_name.clone(), None))?
            }
        };

        let request = ExecRequest {
            command: command.into().to_args(),
            workdir,
            options: OptionSet::new()
                .with(ExecOption::Detach.key(), false)
                .with(ExecOption::Interactive.key(), true)
                .with(ExecOption::Tty.key(), true),
        };

        let client = self.client().await?;
        let exec = client.exec(&container, &request).await?;
        let output = normalize(exec.output).await?;
        debug!(
            "Exec in '{}' exited with code {}",
            container.name, exec.exit_code
        );

        Ok(ExecResult {
            exit_code: exec.exit_code,
            output,
        })
    }

    /// Logs of the current container.
    pub async fn fetch_logs(&mut self, stream: bool) -> SessionResult<String> {
        let container = self
            .current_container
            .clone()
            .ok_or(SessionError::NoCurrentContainer)?;

        let client = self.client().await?;
        let logs = client.logs(&container, stream).await?;
        normalize(logs).await
    }

    pub async fn list_containers(&mut self, all: bool) -> SessionResult<Vec<ContainerSummary>> {
        let client = self.client().await?;
        Ok(client.list_containers(all).await?)
    }

    /// Tear down the session's container and reset the session.
    ///
    /// In remove mode the engine removes containers on exit, so a tracked
    /// container is force-removed only if it is still there (a foreground run
    /// that failed is kept for its logs), then dangling volumes are pruned.
    /// Otherwise the container is stopped and force-removed together with its
    /// volumes.
    pub async fn clean_container(&mut self) -> SessionResult<()> {
        let client = self.client().await?;

        if self.is_remove() {
            debug!("Remove volumes and init params about docker.");
            if let Some(container) = self.current_container.clone() {
                match client.remove_container(&container, true, true).await {
                    Ok(()) => info!("Container '{}' cleaned", container.name),
                    // 404: already auto-removed, 409: removal in progress
                    Err(e) if matches!(e.status_code(), Some(404) | Some(409)) => {
                        debug!("Container '{}' already removed: {}", container.name, e);
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            client.prune_volumes().await?;
            self.reset();
            return Ok(());
        }

        let container = match &self.current_container {
            Some(container) => Some(container.clone()),
            None => match &self.container_name {
                Some(name) => client.get_container(name).await?,
                None => None,
            },
        };

        match container {
            Some(container) => {
                client.stop_container(&container).await?;
                client.remove_container(&container, true, true).await?;
                info!("Container '{}' cleaned", container.name);
            }
            None => warn!(
                "Container: '{}' not found.",
                self.container_name.as_deref().unwrap_or_default()
            ),
        }

        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.options.clear();
        self.container_name = None;
        self.current_container = None;
    }
}

impl std::fmt::Debug for ContainerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerSession")
            .field("image", &self.image)
            .field("container_name", &self.container_name)
            .field("current_container", &self.current_container)
            .field("options", &self.options)
            .finish()
    }
}
