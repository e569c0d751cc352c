//! Docker implementation of EngineClient.

use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, ListContainersOptions, LogOutput,
    LogsOptions, RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
    WaitContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecOptions, StartExecResults};
use bollard::image::CreateImageOptions;
use bollard::service::HostConfig;
use bollard::volume::PruneVolumesOptions;
use bollard::Docker;
use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::engine::{
    ContainerHandle, ContainerSummary, EngineClient, ExecOutput, ExecRequest, ImageRef,
    RunOutcome, RunRequest,
};
use crate::error::{EngineError, EngineResult};
use crate::options::{ExecOption, RunOption};
use crate::output::EngineOutput;
use crate::translate::absorb_not_found;

/// Container engine backed by the Docker API.
#[derive(Clone)]
pub struct DockerEngine {
    client: Docker,
}

impl DockerEngine {
    /// Connect according to `config` and verify the daemon answers.
    pub async fn connect(config: &ConnectionConfig) -> EngineResult<Self> {
        let client = Self::build_client(config)?;

        client
            .ping()
            .await
            .map_err(|e| EngineError::NotAvailable(e.to_string()))?;

        Ok(Self { client })
    }

    /// Build the bollard client without contacting the daemon.
    fn build_client(config: &ConnectionConfig) -> EngineResult<Docker> {
        let client = match config.host.as_deref() {
            Some(host) if !config.is_local() => {
                Docker::connect_with_http(host, config.timeout_secs, bollard::API_DEFAULT_VERSION)
            }
            _ => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| EngineError::NotAvailable(e.to_string()))?;

        Ok(client.with_timeout(Duration::from_secs(config.timeout_secs)))
    }

    /// Wrap an existing bollard client.
    pub fn from_client(client: Docker) -> Self {
        Self { client }
    }

    async fn inspect_handle(&self, name: &str) -> EngineResult<ContainerHandle> {
        let info = self
            .client
            .inspect_container(name, None::<InspectContainerOptions>)
            .await?;

        Ok(ContainerHandle::new(
            info.id.unwrap_or_default(),
            info.name.unwrap_or_else(|| name.to_string()),
        ))
    }

    fn container_config(request: &RunRequest) -> Config<String> {
        let options = &request.options;
        let detach = options.is_detach();

        let host_config = HostConfig {
            binds: if request.volumes.is_empty() {
                None
            } else {
                Some(request.volumes.clone())
            },
            // A detached container cannot be removed by us after it exits.
            auto_remove: Some(detach && options.is_remove()),
            privileged: options.flag(RunOption::Privileged),
            network_mode: options.text(RunOption::NetworkMode),
            readonly_rootfs: options.flag(RunOption::ReadOnly),
            init: options.flag(RunOption::Init),
            ..Default::default()
        };

        Config {
            image: Some(request.image.clone()),
            entrypoint: request.entrypoint.clone(),
            cmd: request.command.clone(),
            env: request.environment.as_ref().map(|e| e.to_vec()),
            user: options.text(RunOption::User),
            working_dir: options.text(RunOption::WorkingDir),
            hostname: options.text(RunOption::Hostname),
            domainname: options.text(RunOption::Domainname),
            tty: Some(options.is_tty()),
            open_stdin: Some(options.is_interactive()),
            attach_stdin: Some(!detach && options.is_interactive()),
            attach_stdout: Some(!detach),
            attach_stderr: Some(!detach),
            host_config: Some(host_config),
            ..Default::default()
        }
    }

    async fn wait_exit_code(&self, container_id: &str) -> EngineResult<i64> {
        let mut wait_stream = self
            .client
            .wait_container(container_id, None::<WaitContainerOptions<String>>);

        match wait_stream.next().await {
            Some(Ok(exit)) => Ok(exit.status_code),
            // bollard reports a non-zero exit as an error carrying the code
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(e)) => Err(e.into()),
            None => Err(EngineError::Transport("Container wait failed".into())),
        }
    }

    async fn collect_stdout(&self, container_id: &str) -> EngineResult<Bytes> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: false,
            ..Default::default()
        };

        let mut buffer = BytesMut::new();
        let mut stream = self.client.logs(container_id, Some(options));
        while let Some(chunk) = stream.next().await {
            buffer.extend_from_slice(&log_bytes(chunk?));
        }
        Ok(buffer.freeze())
    }
}

fn log_bytes(output: LogOutput) -> Bytes {
    match output {
        LogOutput::StdOut { message }
        | LogOutput::StdErr { message }
        | LogOutput::StdIn { message }
        | LogOutput::Console { message } => message,
    }
}

#[async_trait]
impl EngineClient for DockerEngine {
    async fn pull_image(&self, repository: &str, tag: &str) -> EngineResult<ImageRef> {
        info!("Pulling image {}:{}", repository, tag);

        let options = CreateImageOptions {
            from_image: repository,
            tag,
            ..Default::default()
        };

        let mut stream = self.client.create_image(Some(options), None, None);
        while let Some(result) = stream.next().await {
            let progress = result?;
            if let Some(status) = progress.status {
                debug!("Pull status: {}", status);
            }
        }

        let image = ImageRef::new(repository, tag);
        let inspect = self.client.inspect_image(&image.reference()).await?;

        info!("Image {} pulled successfully", image);
        Ok(match inspect.id {
            Some(id) => image.with_id(id),
            None => image,
        })
    }

    async fn run_container(&self, request: &RunRequest) -> EngineResult<RunOutcome> {
        let options = &request.options;
        let unknown = options.unrecognized_run_keys();
        if !unknown.is_empty() {
            warn!("Run options without a Docker mapping are ignored: {:?}", unknown);
        }

        debug!("Creating container from image {}", request.image);
        let create_options = request.name.as_deref().map(|name| CreateContainerOptions {
            name,
            platform: None,
        });

        let created = self
            .client
            .create_container(create_options, Self::container_config(request))
            .await?;
        for warning in &created.warnings {
            warn!("Docker: {}", warning);
        }

        self.client
            .start_container(&created.id, None::<StartContainerOptions<String>>)
            .await?;

        let handle = self.inspect_handle(&created.id).await?;
        if options.is_detach() {
            info!("Started detached container {}", handle);
            return Ok(RunOutcome::Detached(handle));
        }

        let exit_code = self.wait_exit_code(&created.id).await?;
        if exit_code != 0 {
            // Kept around so its logs can still be read.
            warn!("Container {} exited with code {}", handle, exit_code);
            return Ok(RunOutcome::RuntimeFailure {
                container: handle,
                exit_code,
            });
        }

        let stdout = self.collect_stdout(&created.id).await?;
        if options.is_remove() {
            self.remove_container(&handle, false, false).await?;
        }
        Ok(RunOutcome::Completed(EngineOutput::Buffer(stdout)))
    }

    async fn get_container(&self, name: &str) -> EngineResult<Option<ContainerHandle>> {
        absorb_not_found(self.inspect_handle(name).await.map(Some))
    }

    async fn list_containers(&self, all: bool) -> EngineResult<Vec<ContainerSummary>> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };

        let containers = self.client.list_containers(Some(options)).await?;
        Ok(containers
            .into_iter()
            .map(|c| {
                let name = c
                    .names
                    .as_ref()
                    .and_then(|names| names.first().cloned())
                    .unwrap_or_default();
                ContainerSummary {
                    handle: ContainerHandle::new(c.id.unwrap_or_default(), name),
                    image: c.image,
                    state: c.state,
                    labels: c.labels.unwrap_or_default(),
                }
            })
            .collect())
    }

    async fn exec(
        &self,
        container: &ContainerHandle,
        request: &ExecRequest,
    ) -> EngineResult<ExecOutput> {
        let options = &request.options;
        let detach = options.is_true(ExecOption::Detach.key());

        debug!("Exec in {}: {:?}", container, request.command);
        let exec = self
            .client
            .create_exec(
                &container.id,
                CreateExecOptions {
                    cmd: Some(request.command.clone()),
                    attach_stdin: Some(options.is_true(ExecOption::Interactive.key())),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    tty: Some(options.is_true(ExecOption::Tty.key())),
                    working_dir: request.workdir.clone(),
                    ..Default::default()
                },
            )
            .await?;

        let mut buffer = BytesMut::new();
        match self
            .client
            .start_exec(
                &exec.id,
                Some(StartExecOptions {
                    detach,
                    ..Default::default()
                }),
            )
            .await?
        {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(chunk) = output.next().await {
                    buffer.extend_from_slice(&log_bytes(chunk?));
                }
            }
            StartExecResults::Detached => {
                debug!("Exec {} started detached", exec.id);
            }
        }

        let inspect = self.client.inspect_exec(&exec.id).await?;
        Ok(ExecOutput {
            exit_code: inspect.exit_code.unwrap_or(-1),
            output: EngineOutput::Buffer(buffer.freeze()),
        })
    }

    async fn logs(&self, container: &ContainerHandle, stream: bool) -> EngineResult<EngineOutput> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            ..Default::default()
        };

        let chunks = self
            .client
            .logs(&container.id, Some(options))
            .map(|chunk| chunk.map(log_bytes).map_err(EngineError::from));

        if stream {
            return Ok(EngineOutput::Stream(chunks.boxed()));
        }

        let mut buffer = BytesMut::new();
        let mut chunks = chunks.boxed();
        while let Some(chunk) = chunks.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(EngineOutput::Buffer(buffer.freeze()))
    }

    async fn stop_container(&self, container: &ContainerHandle) -> EngineResult<()> {
        info!("Stopping container {}", container);
        match self
            .client
            .stop_container(&container.id, None::<StopContainerOptions>)
            .await
        {
            Ok(()) => Ok(()),
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => {
                debug!("Container {} already stopped", container);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove_container(
        &self,
        container: &ContainerHandle,
        force: bool,
        volumes: bool,
    ) -> EngineResult<()> {
        info!("Removing container {}", container);
        self.client
            .remove_container(
                &container.id,
                Some(RemoveContainerOptions {
                    force,
                    v: volumes,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    async fn prune_volumes(&self) -> EngineResult<Vec<String>> {
        let response = self
            .client
            .prune_volumes(None::<PruneVolumesOptions<String>>)
            .await?;

        let pruned = response.volumes_deleted.unwrap_or_default();
        info!("Pruned {} volume(s)", pruned.len());
        Ok(pruned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::OptionSet;

    #[test]
    fn test_container_config_detached_remove_uses_auto_remove() {
        let request = RunRequest {
            image: "alpine:3.18".into(),
            entrypoint: Some(vec!["bash".into()]),
            volumes: vec!["/tmp/data:/data:ro".into()],
            options: OptionSet::new()
                .with(RunOption::Detach.key(), true)
                .with(RunOption::Remove.key(), true)
                .with(RunOption::Tty.key(), true),
            ..Default::default()
        };

        let config = DockerEngine::container_config(&request);
        let host = config.host_config.unwrap();

        assert_eq!(host.auto_remove, Some(true));
        assert_eq!(host.binds, Some(vec!["/tmp/data:/data:ro".to_string()]));
        assert_eq!(config.tty, Some(true));
        assert_eq!(config.attach_stdout, Some(false));
        assert_eq!(config.entrypoint, Some(vec!["bash".to_string()]));
    }

    #[test]
    fn test_container_config_foreground_attaches() {
        let request = RunRequest {
            image: "alpine:3.18".into(),
            command: Some(vec!["echo".into(), "hi".into()]),
            options: OptionSet::new().with(RunOption::Remove.key(), true),
            ..Default::default()
        };

        let config = DockerEngine::container_config(&request);

        assert_eq!(config.attach_stdout, Some(true));
        assert_eq!(config.cmd, Some(vec!["echo".to_string(), "hi".to_string()]));
        assert_eq!(config.host_config.unwrap().auto_remove, Some(false));
    }

    #[test]
    fn test_container_config_forwards_run_options() {
        let request = RunRequest {
            image: "alpine:3.18".into(),
            options: OptionSet::new()
                .with("privileged", true)
                .with("user", "1000")
                .with("working_dir", "/src")
                .with("hostname", "builder")
                .with("network_mode", "host")
                .with("read_only", true),
            ..Default::default()
        };

        let config = DockerEngine::container_config(&request);

        assert_eq!(config.user.as_deref(), Some("1000"));
        assert_eq!(config.working_dir.as_deref(), Some("/src"));
        assert_eq!(config.hostname.as_deref(), Some("builder"));
        assert_eq!(config.domainname, None);

        let host = config.host_config.unwrap();
        assert_eq!(host.privileged, Some(true));
        assert_eq!(host.network_mode.as_deref(), Some("host"));
        assert_eq!(host.readonly_rootfs, Some(true));
        assert_eq!(host.init, None);
    }

    #[tokio::test]
    async fn test_client_uses_configured_timeout() {
        let local = DockerEngine::build_client(&ConnectionConfig::new().timeout(7)).unwrap();
        assert_eq!(local.timeout(), Duration::from_secs(7));

        let remote = DockerEngine::build_client(
            &ConnectionConfig::new().host("tcp://127.0.0.1:2375").timeout(30),
        )
        .unwrap();
        assert_eq!(remote.timeout(), Duration::from_secs(30));
    }
}
