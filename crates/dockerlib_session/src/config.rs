//! Connection configuration and run argument types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default request timeout towards the daemon, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// How to reach the container engine daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Daemon address (e.g. `tcp://127.0.0.1:2375`). Local socket defaults when unset.
    pub host: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `DOCKER_HOST` and `DOCKERLIB_TIMEOUT` from the environment.
    pub fn from_env() -> Self {
        let host = std::env::var("DOCKER_HOST")
            .ok()
            .filter(|h| !h.trim().is_empty());
        let timeout_secs = std::env::var("DOCKERLIB_TIMEOUT")
            .ok()
            .and_then(|t| t.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self { host, timeout_secs }
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    /// Whether the host points at a local unix socket rather than a TCP endpoint.
    pub fn is_local(&self) -> bool {
        match &self.host {
            None => true,
            Some(h) => h.starts_with("unix://") || h.starts_with("npipe://"),
        }
    }
}

/// A command, either as one shell-style string or as pre-split arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    Shell(String),
    Args(Vec<String>),
}

impl CommandLine {
    /// Split into argv. Shell strings follow POSIX quoting rules; a string
    /// with unbalanced quotes is passed through as a single argument.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            Self::Shell(s) => shell_words::split(s).unwrap_or_else(|_| vec![s.clone()]),
            Self::Args(args) => args.clone(),
        }
    }
}

impl From<&str> for CommandLine {
    fn from(value: &str) -> Self {
        Self::Shell(value.to_string())
    }
}

impl From<String> for CommandLine {
    fn from(value: String) -> Self {
        Self::Shell(value)
    }
}

impl From<Vec<String>> for CommandLine {
    fn from(value: Vec<String>) -> Self {
        Self::Args(value)
    }
}

impl From<Vec<&str>> for CommandLine {
    fn from(value: Vec<&str>) -> Self {
        Self::Args(value.into_iter().map(String::from).collect())
    }
}

/// Container environment, as `KEY=VALUE` entries or as a map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Environment {
    List(Vec<String>),
    Map(BTreeMap<String, String>),
}

impl Environment {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::List(entries) => entries.clone(),
            Self::Map(map) => map.iter().map(|(k, v)| format!("{}={}", k, v)).collect(),
        }
    }
}

impl From<Vec<String>> for Environment {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<BTreeMap<String, String>> for Environment {
    fn from(value: BTreeMap<String, String>) -> Self {
        Self::Map(value)
    }
}

/// Per-call arguments shared by the run operations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunArgs {
    /// Image reference; the session image is used when unset
    pub image: Option<String>,
    pub command: Option<CommandLine>,
    pub volumes: Vec<String>,
    pub environment: Option<Environment>,
}

impl RunArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn command(mut self, command: impl Into<CommandLine>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn volume(mut self, bind: impl Into<String>) -> Self {
        self.volumes.push(bind.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let entry = format!("{}={}", key.into(), value.into());
        match &mut self.environment {
            Some(Environment::List(entries)) => entries.push(entry),
            Some(Environment::Map(map)) => {
                if let Some((k, v)) = entry.split_once('=') {
                    map.insert(k.to_string(), v.to_string());
                }
            }
            None => self.environment = Some(Environment::List(vec![entry])),
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_config_builder() {
        let config = ConnectionConfig::new().host("tcp://10.0.0.5:2375").timeout(30);

        assert_eq!(config.host.as_deref(), Some("tcp://10.0.0.5:2375"));
        assert_eq!(config.timeout_secs, 30);
        assert!(!config.is_local());
        assert!(ConnectionConfig::default().is_local());
    }

    #[test]
    fn test_shell_command_is_split() {
        let cmd = CommandLine::from("sh -c 'echo hi && ls /'");
        assert_eq!(cmd.to_args(), vec!["sh", "-c", "echo hi && ls /"]);

        let cmd = CommandLine::from(vec!["ls", "-la"]);
        assert_eq!(cmd.to_args(), vec!["ls", "-la"]);
    }

    #[test]
    fn test_environment_forms() {
        let mut map = BTreeMap::new();
        map.insert("B".to_string(), "2".to_string());
        map.insert("A".to_string(), "1".to_string());
        assert_eq!(Environment::from(map).to_vec(), vec!["A=1", "B=2"]);

        let args = RunArgs::new().env("CI", "true").env("LANG", "C.UTF-8");
        assert_eq!(
            args.environment.unwrap().to_vec(),
            vec!["CI=true", "LANG=C.UTF-8"]
        );
    }

    #[test]
    fn test_run_args_deserialize() {
        let args: RunArgs = serde_json::from_str(
            r#"{"image": "alpine:3.18", "command": ["echo", "hi"], "environment": {"A": "1"}}"#,
        )
        .unwrap();

        assert_eq!(args.image.as_deref(), Some("alpine:3.18"));
        assert_eq!(args.command, Some(CommandLine::from(vec!["echo", "hi"])));
        assert!(args.volumes.is_empty());
    }
}
