//! End-to-end change detection
//!
//! Ties the catalogs, the dependency graph, the change mapper and the
//! registry client together into one [`DetectionResult`] per run.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{services, BaseImageCatalog, ServiceEntry};
use crate::changes::{changed_by_prefix, ChangedPathsProvider, ChangesError, GitDiff, WatchedDirectory};
use crate::compose::{ComposeError, DockerCompose, ResolvedServiceProvider};
use crate::config::BuildscopeConfig;
use crate::dockerfile::Dockerfile;
use crate::fs::{FileSystem, RealFileSystem};
use crate::graph::{affected_services, reverse_map, ReverseDependencyMap};
use crate::inspect::has_real_tests;
use crate::output::DetectionResult;
use crate::registry::{BuildDecision, DockerManifestOracle, ForkValidationError, RegistryClient};

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("failed to query git: {0}")]
    Changes(#[from] ChangesError),

    #[error("failed to resolve services: {0}")]
    Compose(#[from] ComposeError),

    #[error(transparent)]
    Fork(#[from] ForkValidationError),
}

/// Per-run inputs, passed explicitly through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub repo_root: PathBuf,
    pub base_ref: String,
    pub head_ref: String,
    /// Commit whose published images may be retagged instead of rebuilt;
    /// the commit `base_ref` points at when unset
    pub target_sha: Option<String>,
    pub is_fork: bool,
    /// When false every service that is not skipped outright is built
    pub check_registry: bool,
}

impl RunContext {
    pub fn new(repo_root: impl Into<PathBuf>, base_ref: impl Into<String>, head_ref: impl Into<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            base_ref: base_ref.into(),
            head_ref: head_ref.into(),
            target_sha: None,
            is_fork: false,
            check_registry: true,
        }
    }

    pub fn with_target_sha(mut self, target_sha: impl Into<String>) -> Self {
        self.target_sha = Some(target_sha.into());
        self
    }

    pub fn with_fork(mut self, is_fork: bool) -> Self {
        self.is_fork = is_fork;
        self
    }

    pub fn with_registry_checks(mut self, check_registry: bool) -> Self {
        self.check_registry = check_registry;
        self
    }
}

/// Catalogs and dependency graph of one repository checkout.
#[derive(Debug, Clone)]
pub struct Inventory {
    pub catalog: BaseImageCatalog,
    pub services: Vec<ServiceEntry>,
    pub reverse_map: ReverseDependencyMap,
}

pub struct Detector<F: FileSystem> {
    fs: F,
    config: BuildscopeConfig,
    changes: Arc<dyn ChangedPathsProvider>,
    compose: Arc<dyn ResolvedServiceProvider>,
    registry: RegistryClient,
}

impl Detector<RealFileSystem> {
    /// Detector backed by git, docker compose and `docker manifest inspect`.
    pub fn for_repository(config: BuildscopeConfig, repo_root: &Path) -> Self {
        let changes = Arc::new(GitDiff::new(repo_root, config.command_timeout()));
        let compose = Arc::new(DockerCompose::new(
            repo_root,
            config.compose_file.clone(),
            config.compose_env_file.clone(),
            config.command_timeout(),
        ));
        let registry = RegistryClient::new(
            Arc::new(DockerManifestOracle::new(config.check_timeout())),
            config.registry_root.clone(),
        )
        .with_attempts(config.check_attempts)
        .with_backoff_unit(config.backoff_unit());

        Self::new(RealFileSystem, config, changes, compose, registry)
    }
}

impl<F: FileSystem> Detector<F> {
    pub fn new(
        fs: F,
        config: BuildscopeConfig,
        changes: Arc<dyn ChangedPathsProvider>,
        compose: Arc<dyn ResolvedServiceProvider>,
        registry: RegistryClient,
    ) -> Self {
        Self {
            fs,
            config,
            changes,
            compose,
            registry,
        }
    }

    pub fn config(&self) -> &BuildscopeConfig {
        &self.config
    }

    pub fn base_images_path(&self, repo_root: &Path) -> PathBuf {
        repo_root.join(&self.config.base_images_dir)
    }

    /// Base images, registry services and the graph between them.
    pub async fn inventory(&self, repo_root: &Path) -> Result<Inventory, DetectError> {
        let catalog = BaseImageCatalog::load(
            &self.fs,
            &self.base_images_path(repo_root),
            &self.config.registry_root,
        );

        let resolved = self.compose.resolved_services().await?;
        let services: Vec<_> = services::discover(&resolved, &self.config.registry_root)
            .into_iter()
            .map(|entry| anchor_to_repo(entry, repo_root))
            .collect();

        let reverse_map = reverse_map(&self.fs, &services, &catalog.mapping);
        info!(
            "Inventory: {} base images, {} services, {} base images in use",
            catalog.entries.len(),
            services.len(),
            reverse_map.len()
        );

        Ok(Inventory {
            catalog,
            services,
            reverse_map,
        })
    }

    pub async fn run(&self, ctx: &RunContext) -> Result<DetectionResult, DetectError> {
        let inventory = self.inventory(&ctx.repo_root).await?;
        let Inventory {
            catalog,
            services,
            reverse_map,
        } = &inventory;

        let changed_paths = self.changes.changed_paths(&ctx.base_ref, &ctx.head_ref).await?;

        let base_dir = self.config.base_images_dir.trim_end_matches('/');
        let base_watch: Vec<_> = catalog
            .entries
            .iter()
            .map(|e| WatchedDirectory::new(&e.directory, format!("{}/{}", base_dir, e.directory)))
            .collect();
        let changed_base_images = changed_by_prefix(&changed_paths, &base_watch);

        let service_watch: Vec<_> = services
            .iter()
            .map(|s| {
                WatchedDirectory::new(
                    &s.service_name,
                    repo_relative(&s.build_context, &ctx.repo_root),
                )
            })
            .collect();
        let changed_services = changed_by_prefix(&changed_paths, &service_watch);

        let affected = affected_services(&changed_base_images, reverse_map);
        info!(
            "{} base images changed, {} services changed, {} services affected",
            changed_base_images.len(),
            changed_services.len(),
            affected.len()
        );

        let must_build: BTreeSet<&str> = changed_services
            .iter()
            .chain(affected.iter())
            .map(String::as_str)
            .collect();
        let candidates: Vec<ServiceEntry> = services
            .iter()
            .filter(|s| !must_build.contains(s.service_name.as_str()))
            .cloned()
            .collect();

        let decision = if ctx.check_registry {
            let target_sha = match &ctx.target_sha {
                Some(sha) => sha.clone(),
                None => self.changes.resolve_commit(&ctx.base_ref).await?,
            };
            info!("Checking published images at {}", target_sha);
            self.registry
                .decide_build_or_retag(&candidates, &target_sha)
                .await
        } else {
            debug!("Registry checks disabled, building all {} candidates", candidates.len());
            BuildDecision {
                to_build: candidates.iter().map(|s| s.service_name.clone()).collect(),
                to_retag: Vec::new(),
            }
        };

        let built: Vec<&ServiceEntry> = services
            .iter()
            .filter(|s| {
                must_build.contains(s.service_name.as_str())
                    || decision.to_build.contains(&s.service_name)
            })
            .collect();

        let base_images_needed: Vec<String> = built
            .iter()
            .flat_map(|s| reverse_map.dependencies_of(&s.service_name))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if ctx.is_fork {
            let required: Vec<&str> = base_images_needed
                .iter()
                .filter_map(|dir| catalog.mapping.tag_for(dir))
                .collect();
            self.registry
                .validate_fork_availability(true, &required)
                .await?;
        }

        let changed_base_set: BTreeSet<&str> =
            changed_base_images.iter().map(String::as_str).collect();
        let mut testable_services = Vec::new();
        let mut healthcheck_services = Vec::new();
        let mut version_check_services = Vec::new();

        for service in &built {
            if has_real_tests(&self.fs, &service.build_context) {
                testable_services.push(service.service_name.clone());
            }

            let dockerfile = match self.fs.read_to_string(&service.dockerfile_path) {
                Ok(text) => Dockerfile::parse(&text),
                Err(e) => {
                    warn!("Cannot inspect {}: {:#}", service.service_name, e);
                    continue;
                }
            };
            if dockerfile.has_health_check() {
                healthcheck_services.push(service.service_name.clone());
            }
            let on_changed_base = dockerfile
                .final_stage_base()
                .and_then(|image| catalog.mapping.dir_for(&image).map(str::to_string))
                .map(|dir| changed_base_set.contains(dir.as_str()))
                .unwrap_or(false);
            if on_changed_base {
                version_check_services.push(service.service_name.clone());
            }
        }

        let result = DetectionResult {
            base_images: catalog.directories(),
            changed_base_images,
            base_images_needed,
            changed_services,
            affected_services: affected,
            to_build: built.iter().map(|s| s.service_name.clone()).collect(),
            to_retag: decision.to_retag,
            testable_services,
            healthcheck_services,
            version_check_services,
        };
        info!(
            "Detection complete: {} to build, {} to retag, {} base images needed",
            result.to_build.len(),
            result.to_retag.len(),
            result.base_images_needed.len()
        );
        Ok(result)
    }
}

/// Compose normally resolves contexts to absolute paths; relative ones are
/// taken from the repository root.
fn anchor_to_repo(mut entry: ServiceEntry, repo_root: &Path) -> ServiceEntry {
    if entry.build_context.is_relative() {
        entry.build_context = repo_root.join(&entry.build_context);
    }
    if entry.dockerfile_path.is_relative() {
        entry.dockerfile_path = repo_root.join(&entry.dockerfile_path);
    }
    entry
}

/// `path` relative to `repo_root` with `/` separators, as git prints paths.
fn repo_relative(path: &Path, repo_root: &Path) -> String {
    let relative = match path.strip_prefix(repo_root) {
        Ok(relative) => relative,
        Err(_) => {
            debug!("{} is outside {}", path.display(), repo_root.display());
            path
        }
    };
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
