//! Registry existence checks
//!
//! The only registry question asked is "does this tag exist". Answers feed
//! the build-or-retag decision and the fork gate.

pub mod backoff;
pub mod client;
pub mod oracle;

use thiserror::Error;

pub use backoff::{backoff_delay, classify, DiagnosticClass, Sleeper, TokioSleeper};
pub use client::{retarget_tag, BuildDecision, RegistryClient};
pub use oracle::{DockerManifestOracle, ExistenceOracle, OracleOutcome};

pub const DEFAULT_CHECK_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("invalid image tag '{tag}': {reason}")]
    InvalidTag { tag: String, reason: String },

    #[error("registry rate limit while checking {tag}: {diagnostic}")]
    RateLimited { tag: String, diagnostic: String },

    #[error("checking {tag} failed after {attempts} attempts: {diagnostic}")]
    RetriesExhausted {
        tag: String,
        attempts: u32,
        diagnostic: String,
    },

    #[error("checking {tag} failed: {reason}")]
    CheckFailed { tag: String, reason: String },
}

/// Base images a fork build needs but cannot publish itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "fork build needs base images that are not in the registry: {}. \
     A maintainer must build and push them first from the main repository",
    missing.join(", ")
)]
pub struct ForkValidationError {
    pub missing: Vec<String>,
}
