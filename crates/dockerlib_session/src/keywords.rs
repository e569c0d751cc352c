//! Keyword surface for test frameworks.
//!
//! Maps human-readable keyword names (as a test suite would write them) onto
//! [`ContainerSession`] operations. Arguments arrive as a JSON object and
//! results leave as a serializable [`KeywordValue`].

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{CommandLine, Environment, RunArgs};
use crate::connection::EngineConnection;
use crate::engine::{ContainerHandle, ContainerSummary, ImageRef};
use crate::error::{KeywordError, KeywordResult, SessionError, SessionResult};
use crate::options::OptionSet;
use crate::session::{ContainerSession, ExecResult, RunOutput};

/// Every keyword the library exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    InitEnvironment,
    SetContainerName,
    GetCurrentContainerName,
    SetOptions,
    RefreshOptions,
    GetImage,
    RunByEntrypoint,
    RunByBashDetached,
    RunBashAndCapture,
    Run,
    ExecInContainer,
    FetchLogs,
    CleanContainer,
    ListContainers,
}

impl Keyword {
    pub fn all() -> &'static [Keyword] {
        &[
            Keyword::InitEnvironment,
            Keyword::SetContainerName,
            Keyword::GetCurrentContainerName,
            Keyword::SetOptions,
            Keyword::RefreshOptions,
            Keyword::GetImage,
            Keyword::RunByEntrypoint,
            Keyword::RunByBashDetached,
            Keyword::RunBashAndCapture,
            Keyword::Run,
            Keyword::ExecInContainer,
            Keyword::FetchLogs,
            Keyword::CleanContainer,
            Keyword::ListContainers,
        ]
    }

    /// Name as written in a test suite.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitEnvironment => "Init Docker Test Environment",
            Self::SetContainerName => "Set Container Name",
            Self::GetCurrentContainerName => "Get Current Container Name",
            Self::SetOptions => "Set Options",
            Self::RefreshOptions => "Refresh Options",
            Self::GetImage => "Get Image",
            Self::RunByEntrypoint => "Run Image By Entrypoint",
            Self::RunByBashDetached => "Run Image By Bash With Detach",
            Self::RunBashAndCapture => "Run Image By Bash And Return Exitcode And Output",
            Self::Run => "Run Image",
            Self::ExecInContainer => "Run Container Exec",
            Self::FetchLogs => "Run Container Logs",
            Self::CleanContainer => "Clean Container",
            Self::ListContainers => "List Containers",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::InitEnvironment => "Connect, set the container name and pull repository:tag",
            Self::SetContainerName => "Set the name used for the next container",
            Self::GetCurrentContainerName => "Name of the current container, if any",
            Self::SetOptions => "Replace or merge run options (used_new_config)",
            Self::RefreshOptions => "Replace run options",
            Self::GetImage => "Pull repository:tag as the session image",
            Self::RunByEntrypoint => "Run the image with an entrypoint override",
            Self::RunByBashDetached => "Start a detached interactive bash container",
            Self::RunBashAndCapture => "Run a command via bash and return exit code and output",
            Self::Run => "Run the image with its default entrypoint",
            Self::ExecInContainer => "Execute a command in the current or named container",
            Self::FetchLogs => "Logs of the current container",
            Self::CleanContainer => "Stop and remove the container, reset the session",
            Self::ListContainers => "List containers known to the daemon",
        }
    }

    /// Match a keyword name, ignoring case and `_`/`-`/space differences.
    pub fn parse(name: &str) -> Option<Keyword> {
        let wanted = normalize_name(name);
        Self::all()
            .iter()
            .copied()
            .find(|k| normalize_name(k.name()) == wanted)
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn normalize_name(name: &str) -> String {
    name.split(|c: char| c.is_whitespace() || c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Value returned by a keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum KeywordValue {
    None,
    Text(String),
    Image(ImageRef),
    Container(ContainerHandle),
    Exec(ExecResult),
    Containers(Vec<ContainerSummary>),
}

impl From<RunOutput> for KeywordValue {
    fn from(output: RunOutput) -> Self {
        match output {
            RunOutput::Text(text) => Self::Text(text),
            RunOutput::Container(container) => Self::Container(container),
        }
    }
}

impl fmt::Display for KeywordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Text(text) => f.write_str(text),
            Self::Image(image) => write!(f, "{}", image),
            Self::Container(container) => write!(f, "{}", container),
            Self::Exec(exec) => write!(f, "[{}] {}", exec.exit_code, exec.output),
            Self::Containers(list) => {
                for summary in list {
                    writeln!(
                        f,
                        "{}\t{}",
                        summary.handle,
                        summary.state.as_deref().unwrap_or("unknown")
                    )?;
                }
                Ok(())
            }
        }
    }
}

fn default_tag() -> String {
    "latest".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct InitArgs {
    container_name: String,
    repository: String,
    #[serde(default = "default_tag")]
    tag: String,
}

#[derive(Debug, Deserialize)]
struct ContainerNameArgs {
    container_name: String,
}

#[derive(Debug, Deserialize)]
struct SetOptionsArgs {
    #[serde(default = "default_true")]
    used_new_config: bool,
    #[serde(flatten)]
    options: OptionSet,
}

#[derive(Debug, Deserialize)]
struct ImageArgs {
    repository: String,
    #[serde(default = "default_tag")]
    tag: String,
}

#[derive(Debug, Deserialize)]
struct EntrypointArgs {
    entrypoint: CommandLine,
    #[serde(flatten)]
    run: RunArgs,
    #[serde(default)]
    options: Option<OptionSet>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BashDetachedArgs {
    image: Option<String>,
    volumes: Vec<String>,
    environment: Option<Environment>,
}

#[derive(Debug, Deserialize)]
struct BashCaptureArgs {
    command: CommandLine,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    volumes: Vec<String>,
    #[serde(default)]
    environment: Option<Environment>,
    /// Name or id of an existing container
    #[serde(default)]
    container: Option<String>,
    #[serde(default)]
    workdir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExecArgs {
    command: CommandLine,
    #[serde(default)]
    container: Option<String>,
    #[serde(default)]
    workdir: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogsArgs {
    #[serde(default = "default_true")]
    stream: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ListArgs {
    all: bool,
}

/// Keyword dispatcher owning one session.
pub struct KeywordLibrary {
    session: ContainerSession,
}

impl KeywordLibrary {
    pub fn new(connection: Arc<EngineConnection>) -> Self {
        Self {
            session: ContainerSession::new(connection),
        }
    }

    pub fn session(&self) -> &ContainerSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut ContainerSession {
        &mut self.session
    }

    pub fn keyword_names() -> Vec<&'static str> {
        Keyword::all().iter().map(Keyword::name).collect()
    }

    /// Run the keyword called `name` with `args` (a JSON object or null).
    pub async fn run_keyword(&mut self, name: &str, args: Value) -> KeywordResult<KeywordValue> {
        let keyword =
            Keyword::parse(name).ok_or_else(|| KeywordError::UnknownKeyword(name.to_string()))?;
        info!("Keyword: {}", keyword);
        debug!("Arguments: {}", args);

        let args = if args.is_null() {
            Value::Object(Default::default())
        } else {
            args
        };

        let value: KeywordValue = match keyword {
            Keyword::InitEnvironment => {
                let a: InitArgs = parse_args(keyword, args)?;
                let image = self
                    .session
                    .init_environment(&a.container_name, &a.repository, &a.tag)
                    .await?;
                KeywordValue::Image(image)
            }
            Keyword::SetContainerName => {
                let a: ContainerNameArgs = parse_args(keyword, args)?;
                self.session.set_container_name(a.container_name);
                KeywordValue::None
            }
            Keyword::GetCurrentContainerName => match self.session.current_container_name() {
                Some(name) => KeywordValue::Text(name),
                None => KeywordValue::None,
            },
            Keyword::SetOptions => {
                let a: SetOptionsArgs = parse_args(keyword, args)?;
                self.session.set_options(a.used_new_config, a.options);
                KeywordValue::None
            }
            Keyword::RefreshOptions => {
                let options: OptionSet = parse_args(keyword, args)?;
                self.session.refresh_options(options);
                KeywordValue::None
            }
            Keyword::GetImage => {
                let a: ImageArgs = parse_args(keyword, args)?;
                KeywordValue::Image(self.session.pull_image(&a.repository, &a.tag).await?)
            }
            Keyword::RunByEntrypoint => {
                let a: EntrypointArgs = parse_args(keyword, args)?;
                self.session
                    .run_by_entrypoint(a.entrypoint, a.run, a.options)
                    .await?
                    .into()
            }
            Keyword::RunByBashDetached => {
                let a: BashDetachedArgs = parse_args(keyword, args)?;
                let container = self
                    .session
                    .run_by_bash_detached(a.image, a.volumes, a.environment)
                    .await?;
                KeywordValue::Container(container)
            }
            Keyword::RunBashAndCapture => {
                let a: BashCaptureArgs = parse_args(keyword, args)?;
                let container = self.named_container(a.container.as_deref()).await?;
                let run = RunArgs {
                    image: a.image,
                    command: None,
                    volumes: a.volumes,
                    environment: a.environment,
                };
                let result = self
                    .session
                    .run_bash_and_capture(a.command, run, container, a.workdir)
                    .await?;
                KeywordValue::Exec(result)
            }
            Keyword::Run => {
                let a: RunArgs = parse_args(keyword, args)?;
                self.session.run(a).await?.into()
            }
            Keyword::ExecInContainer => {
                let a: ExecArgs = parse_args(keyword, args)?;
                let container = self.named_container(a.container.as_deref()).await?;
                let result = self
                    .session
                    .exec_in_container(a.command, container, a.workdir)
                    .await?;
                KeywordValue::Exec(result)
            }
            Keyword::FetchLogs => {
                let a: LogsArgs = parse_args(keyword, args)?;
                KeywordValue::Text(self.session.fetch_logs(a.stream).await?)
            }
            Keyword::CleanContainer => {
                self.session.clean_container().await?;
                KeywordValue::None
            }
            Keyword::ListContainers => {
                let a: ListArgs = parse_args(keyword, args)?;
                KeywordValue::Containers(self.session.list_containers(a.all).await?)
            }
        };

        Ok(value)
    }

    /// Resolve a container passed to a keyword by name or id.
    async fn named_container(&mut self, name: Option<&str>) -> SessionResult<Option<ContainerHandle>> {
        let Some(name) = name else {
            return Ok(None);
        };

        let client = self.session.client().await?;
        match client.get_container(name).await? {
            Some(container) => Ok(Some(container)),
            None => Err(SessionError::not_found(Some(name.to_string()), None)),
        }
    }
}

fn parse_args<T: DeserializeOwned>(keyword: Keyword, args: Value) -> KeywordResult<T> {
    serde_json::from_value(args).map_err(|source| KeywordError::InvalidArguments {
        keyword: keyword.name().to_string(),
        source,
    })
}
