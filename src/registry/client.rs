use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::backoff::{backoff_delay, classify, DiagnosticClass, Sleeper, TokioSleeper};
use super::oracle::{ExistenceOracle, OracleOutcome};
use super::{ForkValidationError, RegistryError, DEFAULT_CHECK_ATTEMPTS};
use crate::catalog::ServiceEntry;

/// Services split by whether their image must be rebuilt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildDecision {
    pub to_build: Vec<String>,
    pub to_retag: Vec<String>,
}

/// Replaces the tag of `image` (text after the last `:`) with `tag`.
pub fn retarget_tag(image: &str, tag: &str) -> String {
    let last_component_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    match image[last_component_start..].rfind(':') {
        Some(colon) => format!("{}:{}", &image[..last_component_start + colon], tag),
        None => format!("{}:{}", image, tag),
    }
}

pub struct RegistryClient {
    oracle: Arc<dyn ExistenceOracle>,
    sleeper: Arc<dyn Sleeper>,
    registry_root: String,
    backoff_unit: Duration,
    attempts: u32,
}

impl RegistryClient {
    pub fn new(oracle: Arc<dyn ExistenceOracle>, registry_root: impl Into<String>) -> Self {
        Self {
            oracle,
            sleeper: Arc::new(TokioSleeper),
            registry_root: registry_root.into(),
            backoff_unit: Duration::from_secs(1),
            attempts: DEFAULT_CHECK_ATTEMPTS,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts.max(1);
        self
    }

    pub fn registry_root(&self) -> &str {
        &self.registry_root
    }

    fn validate_tag(&self, tag: &str) -> Result<(), RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidTag {
            tag: tag.to_string(),
            reason: reason.to_string(),
        };

        let path = tag
            .strip_prefix(self.registry_root.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| invalid(&format!("must start with {}/", self.registry_root)))?;

        let last = path.rsplit('/').next().unwrap_or(path);
        match last.split_once(':') {
            Some((name, version)) if !name.is_empty() && !version.is_empty() => Ok(()),
            _ => Err(invalid("expected name:tag")),
        }
    }

    /// Whether `tag` exists in the registry.
    ///
    /// Not-found answers are `Ok(false)`. Transient failures are retried with
    /// doubling backoff up to `max_attempts`; rate limits and anything
    /// unrecognised fail immediately.
    pub async fn check(&self, tag: &str, max_attempts: u32) -> Result<bool, RegistryError> {
        self.validate_tag(tag)?;
        let max_attempts = max_attempts.max(1);

        let mut attempt = 1;
        loop {
            let outcome = self
                .oracle
                .inspect(tag)
                .await
                .map_err(|e| RegistryError::CheckFailed {
                    tag: tag.to_string(),
                    reason: e.to_string(),
                })?;

            let diagnostic = match outcome {
                OracleOutcome::Found => {
                    debug!("{} exists", tag);
                    return Ok(true);
                }
                OracleOutcome::Failed { diagnostic } => diagnostic,
            };

            match classify(&diagnostic) {
                DiagnosticClass::NotFound => {
                    debug!("{} not found", tag);
                    return Ok(false);
                }
                DiagnosticClass::RateLimited => {
                    return Err(RegistryError::RateLimited {
                        tag: tag.to_string(),
                        diagnostic,
                    });
                }
                DiagnosticClass::Unknown => {
                    return Err(RegistryError::CheckFailed {
                        tag: tag.to_string(),
                        reason: diagnostic,
                    });
                }
                DiagnosticClass::Transient if attempt >= max_attempts => {
                    return Err(RegistryError::RetriesExhausted {
                        tag: tag.to_string(),
                        attempts: attempt,
                        diagnostic,
                    });
                }
                DiagnosticClass::Transient => {
                    let delay = backoff_delay(self.backoff_unit, attempt);
                    warn!(
                        "Checking {} failed (attempt {}/{}), retrying in {:?}: {}",
                        tag, attempt, max_attempts, delay, diagnostic
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Retags services whose image already exists at `target_sha`.
    ///
    /// Any check error means the service is rebuilt. Input order is kept.
    pub async fn decide_build_or_retag(&self, services: &[ServiceEntry], target_sha: &str) -> BuildDecision {
        let mut decision = BuildDecision::default();

        for service in services {
            let tag = retarget_tag(&service.image, target_sha);
            match self.check(&tag, self.attempts).await {
                Ok(true) => {
                    debug!("{}: retag {}", service.service_name, tag);
                    decision.to_retag.push(service.service_name.clone());
                }
                Ok(false) => {
                    debug!("{}: {} missing, build", service.service_name, tag);
                    decision.to_build.push(service.service_name.clone());
                }
                Err(e) => {
                    warn!("{}: {}, building instead", service.service_name, e);
                    decision.to_build.push(service.service_name.clone());
                }
            }
        }

        info!(
            "{} services to build, {} to retag",
            decision.to_build.len(),
            decision.to_retag.len()
        );
        decision
    }

    /// Fails when a fork build needs base images the registry does not have.
    ///
    /// Check errors count as missing.
    pub async fn validate_fork_availability<S: AsRef<str>>(
        &self,
        is_fork: bool,
        required_tags: &[S],
    ) -> Result<(), ForkValidationError> {
        if !is_fork || required_tags.is_empty() {
            return Ok(());
        }

        let mut missing = Vec::new();
        for tag in required_tags {
            let tag = tag.as_ref();
            match self.check(tag, self.attempts).await {
                Ok(true) => debug!("Fork build can pull {}", tag),
                Ok(false) => missing.push(tag.to_string()),
                Err(e) => {
                    warn!("Treating {} as missing: {}", tag, e);
                    missing.push(tag.to_string());
                }
            }
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ForkValidationError { missing })
        }
    }
}
