//! Command handlers
//!
//! Each handler returns the process exit code: 0 on success, 1 on failure.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};

use super::commands::{DetectArgs, RepoArgs, TagArgs, ValidateArgs};
use super::output::OutputFormatter;
use crate::catalog::{base_image_dockerfiles, BaseImageCatalog};
use crate::config::BuildscopeConfig;
use crate::detector::{Detector, RunContext};
use crate::fs::RealFileSystem;
use crate::output::{generate_outputs, write_github_output};
use crate::validation::{BuildTarget, Validator};

pub async fn handle_detect(args: &DetectArgs, quiet: bool) -> i32 {
    exit_code(run_detect(args, quiet).await)
}

pub async fn handle_validate(args: &ValidateArgs, quiet: bool) -> i32 {
    match run_validate(args, quiet).await {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => exit_code(Err(e)),
    }
}

pub async fn handle_tag(args: &TagArgs) -> i32 {
    exit_code(run_tag(args))
}

fn exit_code(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

/// Environment configuration with command-line overrides, plus the
/// canonical repository root.
fn load_config(repo: &RepoArgs) -> Result<(BuildscopeConfig, PathBuf)> {
    let mut config = BuildscopeConfig::default();
    if let Some(root) = &repo.registry_root {
        config.registry_root = root.trim().to_string();
    }
    if let Some(dir) = &repo.base_images_dir {
        config.base_images_dir = dir.trim().to_string();
    }
    config.validate().context("Invalid configuration")?;
    debug!("{}", config);

    let repo_root = std::fs::canonicalize(&repo.repo)
        .with_context(|| format!("Repository {} not found", repo.repo.display()))?;
    Ok((config, repo_root))
}

async fn run_detect(args: &DetectArgs, quiet: bool) -> Result<()> {
    let (config, repo_root) = load_config(&args.repo)?;

    let mut ctx = RunContext::new(&repo_root, &args.base_ref, &args.head_ref)
        .with_fork(args.fork)
        .with_registry_checks(!args.skip_registry);
    if let Some(sha) = &args.target_sha {
        ctx = ctx.with_target_sha(sha);
    }
    info!(
        "Detecting changes {}...{} in {}",
        ctx.base_ref,
        ctx.head_ref,
        repo_root.display()
    );

    let detector = Detector::for_repository(config, &repo_root);
    let result = detector.run(&ctx).await?;

    if let Some(path) = &args.github_output {
        let outputs = generate_outputs(&result)?;
        write_github_output(path, &outputs)
            .with_context(|| format!("Failed to publish outputs to {}", path.display()))?;
    }

    if !quiet {
        let formatter = OutputFormatter::new(args.format.into());
        print!("{}", ensure_newline(formatter.format(&result)?));
    }
    Ok(())
}

/// `Ok(false)` when the build files have violations.
async fn run_validate(args: &ValidateArgs, quiet: bool) -> Result<bool> {
    let (config, repo_root) = load_config(&args.repo)?;
    let fs = RealFileSystem;

    let mut targets: Vec<BuildTarget> =
        base_image_dockerfiles(&fs, &repo_root.join(&config.base_images_dir))
            .into_iter()
            .map(|(_, path)| BuildTarget::base_image(path))
            .collect();

    if !args.base_images_only {
        let detector = Detector::for_repository(config, &repo_root);
        let inventory = detector
            .inventory(&repo_root)
            .await
            .context("Failed to list services")?;
        for service in &inventory.services {
            let target = BuildTarget::service(&service.dockerfile_path);
            if !targets.contains(&target) {
                targets.push(target);
            }
        }
    }

    let report = Validator::default().validate_all(&fs, &targets);
    info!(
        "Checked {} build files, {} violations",
        report.checked,
        report.violations.len()
    );

    if !quiet || !report.is_ok() {
        let formatter = OutputFormatter::new(args.format.into());
        print!("{}", ensure_newline(formatter.format_report(&report)?));
    }
    Ok(report.is_ok())
}

fn run_tag(args: &TagArgs) -> Result<()> {
    let (config, repo_root) = load_config(&args.repo)?;
    let catalog = BaseImageCatalog::load(
        &RealFileSystem,
        &repo_root.join(&config.base_images_dir),
        &config.registry_root,
    );

    let formatter = OutputFormatter::new(args.format.into());
    print!("{}", ensure_newline(formatter.format_tags(&catalog)?));
    Ok(())
}

fn ensure_newline(mut text: String) -> String {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands::OutputFormatArg;
    use serial_test::serial;
    use std::fs;
    use tempfile::TempDir;

    fn repo_args(path: PathBuf) -> RepoArgs {
        RepoArgs {
            repo: path,
            registry_root: None,
            base_images_dir: None,
        }
    }

    #[test]
    fn test_ensure_newline() {
        assert_eq!(ensure_newline("a".to_string()), "a\n");
        assert_eq!(ensure_newline("a\n".to_string()), "a\n");
        assert_eq!(ensure_newline(String::new()), "");
    }

    #[test]
    #[serial]
    fn test_load_config_applies_overrides() {
        let dir = TempDir::new().unwrap();
        let mut args = repo_args(dir.path().to_path_buf());
        args.registry_root = Some(" ghcr.io/example/mono ".to_string());
        args.base_images_dir = Some("images".to_string());

        let (config, root) = load_config(&args).unwrap();
        assert_eq!(config.registry_root, "ghcr.io/example/mono");
        assert_eq!(config.base_images_dir, "images");
        assert!(root.is_absolute());
    }

    #[test]
    #[serial]
    fn test_load_config_rejects_bad_input() {
        let dir = TempDir::new().unwrap();
        let mut args = repo_args(dir.path().to_path_buf());
        args.registry_root = Some("ghcr.io/example/".to_string());
        assert!(load_config(&args).is_err());

        let missing = repo_args(dir.path().join("does-not-exist"));
        let err = load_config(&missing).unwrap_err();
        assert!(format!("{:#}", err).contains("not found"));
    }

    #[tokio::test]
    #[serial]
    async fn test_validate_base_images_only() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("base-images");
        fs::create_dir_all(base.join("alpine")).unwrap();
        fs::write(base.join("alpine/Dockerfile"), "FROM alpine:3.22.1\n").unwrap();

        let args = ValidateArgs {
            repo: repo_args(dir.path().to_path_buf()),
            base_images_only: true,
            format: OutputFormatArg::Json,
        };
        assert_eq!(handle_validate(&args, true).await, 0);

        fs::create_dir_all(base.join("mosquitto")).unwrap();
        fs::write(
            base.join("mosquitto/Dockerfile"),
            "FROM eclipse-mosquitto:2.0.22\nRUN apk add --no-cache curl\n",
        )
        .unwrap();
        assert_eq!(handle_validate(&args, true).await, 1);
    }

    #[tokio::test]
    #[serial]
    async fn test_tag_on_missing_repository() {
        let dir = TempDir::new().unwrap();
        let args = TagArgs {
            repo: repo_args(dir.path().join("nope")),
            format: OutputFormatArg::Human,
        };
        assert_eq!(handle_tag(&args).await, 1);
    }
}
