//! Container engine capability and the handle types it hands out.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Environment;
use crate::error::EngineResult;
use crate::options::OptionSet;
use crate::output::EngineOutput;

/// Image returned by the engine after a pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub repository: String,
    pub tag: String,
    /// Daemon-assigned image id, when the engine reports one.
    pub id: Option<String>,
}

impl ImageRef {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
            id: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// `repository:tag`
    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference())
    }
}

/// Reference to a container managed by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerHandle {
    pub id: String,
    pub name: String,
}

impl ContainerHandle {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into().trim_start_matches('/').to_string(),
        }
    }

    /// First 12 characters of the id, as the docker CLI prints it.
    pub fn short_id(&self) -> &str {
        match self.id.char_indices().nth(12) {
            Some((end, _)) => &self.id[..end],
            None => &self.id,
        }
    }
}

impl fmt::Display for ContainerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.short_id())
    }
}

/// Everything the engine needs to start one container.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub image: String,
    pub name: Option<String>,
    pub entrypoint: Option<Vec<String>>,
    pub command: Option<Vec<String>>,
    /// Bind specs in `host:container[:mode]` form.
    pub volumes: Vec<String>,
    pub environment: Option<Environment>,
    pub options: OptionSet,
}

/// Result of a container run, as seen by the caller of the engine.
#[derive(Debug)]
pub enum RunOutcome {
    /// Detached run: the container keeps running in the background.
    Detached(ContainerHandle),
    /// Foreground run that exited zero, with its output.
    Completed(EngineOutput),
    /// Foreground run whose command exited non-zero.
    RuntimeFailure {
        container: ContainerHandle,
        exit_code: i64,
    },
}

/// Command to execute inside a running container.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub command: Vec<String>,
    pub workdir: Option<String>,
    pub options: OptionSet,
}

/// Exit code and raw output of an exec.
#[derive(Debug)]
pub struct ExecOutput {
    pub exit_code: i64,
    pub output: EngineOutput,
}

/// Summary entry from a container listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerSummary {
    pub handle: ContainerHandle,
    pub image: Option<String>,
    pub state: Option<String>,
    pub labels: HashMap<String, String>,
}

/// Operations the session needs from a container engine.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Pull `repository:tag` and return the resulting image.
    async fn pull_image(&self, repository: &str, tag: &str) -> EngineResult<ImageRef>;

    /// Create and start a container.
    async fn run_container(&self, request: &RunRequest) -> EngineResult<RunOutcome>;

    /// Look a container up by name or id. `None` when the daemon does not know it.
    async fn get_container(&self, name: &str) -> EngineResult<Option<ContainerHandle>>;

    async fn list_containers(&self, all: bool) -> EngineResult<Vec<ContainerSummary>>;

    async fn exec(
        &self,
        container: &ContainerHandle,
        request: &ExecRequest,
    ) -> EngineResult<ExecOutput>;

    async fn logs(&self, container: &ContainerHandle, stream: bool) -> EngineResult<EngineOutput>;

    async fn stop_container(&self, container: &ContainerHandle) -> EngineResult<()>;

    async fn remove_container(
        &self,
        container: &ContainerHandle,
        force: bool,
        volumes: bool,
    ) -> EngineResult<()>;

    /// Remove unused volumes. Returns the names of the pruned volumes.
    async fn prune_volumes(&self) -> EngineResult<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_handle_strips_leading_slash() {
        let handle = ContainerHandle::new("0123456789abcdef0123", "/web");
        assert_eq!(handle.name, "web");
        assert_eq!(handle.short_id(), "0123456789ab");
        assert_eq!(handle.to_string(), "web (0123456789ab)");
    }

    #[test]
    fn test_short_id_respects_char_boundaries() {
        let handle = ContainerHandle::new("ééééééééééééééé", "web");
        assert_eq!(handle.short_id(), "éééééééééééé");
        assert_eq!(handle.to_string(), "web (éééééééééééé)");

        let short = ContainerHandle::new("abc", "web");
        assert_eq!(short.short_id(), "abc");
    }

    #[test]
    fn test_image_reference() {
        let image = ImageRef::new("alpine", "3.18").with_id("sha256:abc");
        assert_eq!(image.reference(), "alpine:3.18");
        assert_eq!(image.id.as_deref(), Some("sha256:abc"));
    }
}
