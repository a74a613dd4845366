//! Resolved compose configuration

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::process::{run_command, ProcessError};

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("docker compose config failed: {stderr}")]
    CommandFailed { stderr: String },

    #[error("cannot parse docker compose config output: {0}")]
    Parse(String),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Source of service name → fully resolved service definition.
#[async_trait]
pub trait ResolvedServiceProvider: Send + Sync {
    async fn resolved_services(&self) -> Result<BTreeMap<String, Value>, ComposeError>;
}

#[derive(Debug, Default, Deserialize)]
struct ComposeConfig {
    #[serde(default)]
    services: Option<BTreeMap<String, Value>>,
}

/// Services of `docker compose config --format json` output.
pub fn parse_compose_config(stdout: &str) -> Result<BTreeMap<String, Value>, ComposeError> {
    let config: ComposeConfig =
        serde_json::from_str(stdout).map_err(|e| ComposeError::Parse(e.to_string()))?;
    Ok(config.services.unwrap_or_default())
}

/// `docker compose --env-file ENV -f FILE config --format json`
pub struct DockerCompose {
    repo_root: PathBuf,
    compose_file: String,
    env_file: String,
    timeout: Duration,
}

impl DockerCompose {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        compose_file: impl Into<String>,
        env_file: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            compose_file: compose_file.into(),
            env_file: env_file.into(),
            timeout,
        }
    }

    fn args(&self) -> Vec<&str> {
        vec![
            "compose",
            "--env-file",
            self.env_file.as_str(),
            "-f",
            self.compose_file.as_str(),
            "config",
            "--format",
            "json",
        ]
    }
}

#[async_trait]
impl ResolvedServiceProvider for DockerCompose {
    async fn resolved_services(&self) -> Result<BTreeMap<String, Value>, ComposeError> {
        let output = run_command("docker", &self.args(), Some(&self.repo_root), self.timeout).await?;
        if !output.success {
            return Err(ComposeError::CommandFailed {
                stderr: output.stderr.trim().to_string(),
            });
        }

        let services = parse_compose_config(&output.stdout)?;
        info!("Compose config resolved {} services", services.len());
        Ok(services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_services() {
        let services = parse_compose_config(
            r#"{"name":"homy","services":{"broker":{"image":"ghcr.io/groupsky/homy/mosquitto:latest","build":{"context":"/p/docker/mosquitto"}}},"networks":{}}"#,
        )
        .unwrap();
        assert_eq!(services.len(), 1);
        assert_eq!(
            services["broker"]["image"],
            "ghcr.io/groupsky/homy/mosquitto:latest"
        );
    }

    #[test]
    fn test_parse_without_services() {
        assert!(parse_compose_config(r#"{"services":{}}"#).unwrap().is_empty());
        assert!(parse_compose_config(r#"{"name":"empty"}"#).unwrap().is_empty());
    }

    #[test]
    fn test_parse_invalid_json() {
        assert!(matches!(
            parse_compose_config("services:\n  broker: {}\n"),
            Err(ComposeError::Parse(_))
        ));
    }

    #[test]
    fn test_command_line() {
        let compose = DockerCompose::new("/repo", "docker-compose.yml", "example.env", Duration::from_secs(1));
        assert_eq!(
            compose.args(),
            vec![
                "compose",
                "--env-file",
                "example.env",
                "-f",
                "docker-compose.yml",
                "config",
                "--format",
                "json"
            ]
        );
    }
}
