//! Error types for the session module.

use thiserror::Error;

use crate::engine::ContainerHandle;

/// Result type alias for engine-level operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Result type alias for keyword dispatch.
pub type KeywordResult<T> = Result<T, KeywordError>;

/// Errors reported by the container engine daemon or its transport.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Docker API error ({status_code}): {message}")]
    Api { status_code: u16, message: String },

    #[error("Docker not available: {0}")]
    NotAvailable(String),

    #[error("Docker transport error: {0}")]
    Transport(String),
}

impl EngineError {
    /// HTTP status reported by the daemon, if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }
}

impl From<bollard::errors::Error> for EngineError {
    fn from(err: bollard::errors::Error) -> Self {
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code,
                message,
            } => Self::Api {
                status_code,
                message,
            },
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Errors surfaced to callers of [`ContainerSession`](crate::ContainerSession).
#[derive(Error, Debug)]
pub enum SessionError {
    /// The daemon refused to create a container because of a conflict (409).
    #[error("{message}")]
    CreateConflict { message: String, status_code: u16 },

    #[error("{}", not_found_message(.name.as_deref(), .id.as_deref()))]
    ContainerNotFound {
        name: Option<String>,
        id: Option<String>,
    },

    #[error("Current container is None.")]
    NoCurrentContainer,

    #[error("Image is None.")]
    ImageNotAvailable,

    #[error("Container '{}' exited with code {exit_code}", .container.name)]
    ContainerRuntime {
        container: ContainerHandle,
        exit_code: i64,
    },

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Output is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl SessionError {
    pub fn not_found(name: Option<String>, id: Option<String>) -> Self {
        Self::ContainerNotFound { name, id }
    }
}

/// Errors raised while dispatching a keyword call.
#[derive(Error, Debug)]
pub enum KeywordError {
    #[error("No keyword with name '{0}' found.")]
    UnknownKeyword(String),

    #[error("Invalid arguments for keyword '{keyword}': {source}")]
    InvalidArguments {
        keyword: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Session(#[from] SessionError),
}

fn not_found_message(name: Option<&str>, id: Option<&str>) -> String {
    match (name, id) {
        (None, None) => "Docker Container Object has not been assigned.".to_string(),
        (Some(name), None) => format!("Docker Container '{}' does not exist.", name),
        (None, Some(id)) => format!("Docker Container with ID '{}' does not exist.", id),
        (Some(name), Some(id)) => format!(
            "Docker Container '{}' with ID '{}' does not exist.",
            name, id
        ),
    }
}
