use std::time::Duration;

use async_trait::async_trait;

use crate::process::{run_command, ProcessError};

/// Raw answer of one existence probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OracleOutcome {
    Found,
    /// The probe ran but did not confirm the tag; the text says why.
    Failed { diagnostic: String },
}

/// Something that can probe a registry for a tag.
///
/// `Err` means the probe itself could not run.
#[async_trait]
pub trait ExistenceOracle: Send + Sync {
    async fn inspect(&self, image: &str) -> Result<OracleOutcome, ProcessError>;
}

/// `docker manifest inspect <tag>`
pub struct DockerManifestOracle {
    timeout: Duration,
}

impl DockerManifestOracle {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ExistenceOracle for DockerManifestOracle {
    async fn inspect(&self, image: &str) -> Result<OracleOutcome, ProcessError> {
        let output = run_command("docker", &["manifest", "inspect", image], None, self.timeout).await?;
        if output.success {
            Ok(OracleOutcome::Found)
        } else {
            Ok(OracleOutcome::Failed {
                diagnostic: output.diagnostic(),
            })
        }
    }
}
