//! Run command - Execute a keyword suite against one container session.
//!
//! A suite is a YAML file:
//!
//! ```yaml
//! name: smoke
//! steps:
//!   - keyword: Init Docker Test Environment
//!     args: { container_name: smoke, repository: ubuntu, tag: "22.04" }
//!   - keyword: Run Image By Bash And Return Exitcode And Output
//!     args: { command: "cat /etc/os-release" }
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use dockerlib_session::{
    ConnectionConfig, EngineConnection, Keyword, KeywordError, KeywordLibrary,
};

#[derive(Args)]
pub struct RunArgs {
    /// Path to the suite file
    pub suite: PathBuf,

    /// Clean the container after the suite, even when a step fails
    #[arg(long)]
    pub clean: bool,
}

/// Keyword suite loaded from YAML.
#[derive(Debug, Deserialize)]
pub struct Suite {
    #[serde(default)]
    pub name: Option<String>,
    pub steps: Vec<Step>,
}

/// One keyword call.
#[derive(Debug, Deserialize)]
pub struct Step {
    pub keyword: String,
    #[serde(default)]
    pub args: Value,
}

impl Suite {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read suite file: {}", path.display()))?;
        let suite: Suite = serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid suite file: {}", path.display()))?;

        for (index, step) in suite.steps.iter().enumerate() {
            if Keyword::parse(&step.keyword).is_none() {
                return Err(KeywordError::UnknownKeyword(step.keyword.clone()))
                    .with_context(|| format!("Step {}", index + 1));
            }
        }
        Ok(suite)
    }
}

pub async fn execute(args: RunArgs, config: ConnectionConfig) -> Result<()> {
    let suite = Suite::load(&args.suite)?;
    let name = suite
        .name
        .clone()
        .unwrap_or_else(|| args.suite.display().to_string());
    info!("Running suite: {} ({} steps)", name, suite.steps.len());

    let connection = Arc::new(EngineConnection::new(config));
    let mut library = KeywordLibrary::new(connection);

    let result = run_steps(&mut library, &suite).await;

    if args.clean {
        if let Err(e) = library.run_keyword(Keyword::CleanContainer.name(), Value::Null).await {
            warn!("Cleanup failed: {}", e);
        }
    }

    result?;
    println!("\n✅ Suite '{}' passed", name);
    Ok(())
}

async fn run_steps(library: &mut KeywordLibrary, suite: &Suite) -> Result<()> {
    for (index, step) in suite.steps.iter().enumerate() {
        println!("▶ [{}/{}] {}", index + 1, suite.steps.len(), step.keyword);

        let value = library
            .run_keyword(&step.keyword, step.args.clone())
            .await
            .with_context(|| format!("Step {} '{}' failed", index + 1, step.keyword))?;

        let text = value.to_string();
        if !text.is_empty() {
            for line in text.lines() {
                println!("   {}", line);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn suite_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_suite() {
        let file = suite_file(
            r#"
name: smoke
steps:
  - keyword: Init Docker Test Environment
    args:
      container_name: smoke
      repository: ubuntu
      tag: "22.04"
  - keyword: clean_container
"#,
        );

        let suite = Suite::load(file.path()).unwrap();
        assert_eq!(suite.name.as_deref(), Some("smoke"));
        assert_eq!(suite.steps.len(), 2);
        assert_eq!(suite.steps[0].args["repository"], "ubuntu");
        assert_eq!(suite.steps[0].args["tag"], "22.04");
        assert!(suite.steps[1].args.is_null());
    }

    #[test]
    fn test_load_suite_rejects_unknown_keyword() {
        let file = suite_file("steps:\n  - keyword: Launch Rocket\n");

        let err = Suite::load(file.path()).unwrap_err();
        assert!(format!("{:#}", err).contains("No keyword with name 'Launch Rocket' found."));
        assert!(err.chain().any(|c| c.downcast_ref::<KeywordError>().is_some()));
    }

    #[test]
    fn test_load_suite_rejects_malformed_yaml() {
        let file = suite_file("steps: [keyword");

        let err = Suite::load(file.path()).unwrap_err();
        assert!(err.chain().any(|c| c.downcast_ref::<serde_yaml::Error>().is_some()));
    }

    #[test]
    fn test_load_missing_suite() {
        let err = Suite::load(Path::new("/nonexistent/suite.yaml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read suite file"));
    }
}
