//! buildscope - change detection for monorepo container images
//!
//! Given two git revisions of a repository that mirrors upstream base images
//! and builds compose services on top of them, buildscope decides what CI has
//! to do: which base images changed, which services must be rebuilt because
//! their own files or one of their base images changed, which unchanged
//! services can simply be retagged from an earlier commit, and which health,
//! test and version checks apply to the rebuilt services.
//!
//! # Example Usage
//!
//! ```no_run
//! use buildscope::{BuildscopeConfig, Detector, RunContext};
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let repo = Path::new("/work/homy");
//! let detector = Detector::for_repository(BuildscopeConfig::default(), repo);
//!
//! let ctx = RunContext::new(repo, "origin/master", "HEAD");
//! let result = detector.run(&ctx).await?;
//!
//! println!("build: {:?}", result.to_build);
//! println!("retag: {:?}", result.to_retag);
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`dockerfile`]: build-file instruction model
//! - [`catalog`]: base-image and service discovery
//! - [`graph`]: base image to service dependencies
//! - [`changes`]: changed paths to catalog entries
//! - [`registry`]: registry existence checks, retag decisions, fork gate
//! - [`detector`]: the end-to-end pipeline
//! - [`validation`]: build-file rules
//! - [`output`]: CI step outputs

pub mod catalog;
pub mod changes;
pub mod cli;
pub mod compose;
pub mod config;
pub mod detector;
pub mod dockerfile;
pub mod fs;
pub mod graph;
pub mod inspect;
pub mod output;
pub mod process;
pub mod registry;
pub mod util;
pub mod validation;
pub mod version;

pub use catalog::{BaseImageCatalog, BaseImageEntry, GhcrMapping, ServiceEntry};
pub use changes::{ChangedPathsProvider, ChangesError, GitDiff, WatchedDirectory};
pub use compose::{ComposeError, DockerCompose, ResolvedServiceProvider};
pub use config::{BuildscopeConfig, ConfigError};
pub use detector::{DetectError, Detector, Inventory, RunContext};
pub use dockerfile::Dockerfile;
pub use graph::ReverseDependencyMap;
pub use output::{DetectionResult, OutputError};
pub use registry::{ForkValidationError, RegistryClient, RegistryError};
pub use util::{init_logging, LoggingConfig};
pub use validation::{ValidationError, ValidationReport, Validator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
