//! Changed paths → changed catalog entries

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

use crate::process::{run_command, ProcessError};

#[derive(Debug, Error)]
pub enum ChangesError {
    #[error("git diff {range} failed: {stderr}")]
    CommandFailed { range: String, stderr: String },

    #[error("cannot resolve {revision} to a commit: {stderr}")]
    UnknownRevision { revision: String, stderr: String },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// A named directory whose contents are watched for changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedDirectory {
    pub name: String,
    pub directory: String,
}

impl WatchedDirectory {
    pub fn new(name: impl Into<String>, directory: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
        }
    }

    /// Strictly under the directory; the directory path itself does not count.
    pub fn contains(&self, path: &str) -> bool {
        let directory = normalize(&self.directory);
        let path = normalize(path);
        if directory.is_empty() {
            return !path.is_empty();
        }
        path.strip_prefix(directory)
            .map(|rest| rest.starts_with('/') && rest.len() > 1)
            .unwrap_or(false)
    }
}

fn normalize(path: &str) -> &str {
    let path = path.trim();
    if path == "." {
        return "";
    }
    let path = path.strip_prefix("./").unwrap_or(path);
    path.strip_suffix('/').unwrap_or(path)
}

/// Names of entries with at least one changed path nested under them, sorted.
pub fn changed_by_prefix<S: AsRef<str>>(changed_paths: &[S], entries: &[WatchedDirectory]) -> Vec<String> {
    let changed: BTreeSet<String> = entries
        .iter()
        .filter(|entry| changed_paths.iter().any(|p| entry.contains(p.as_ref())))
        .map(|entry| entry.name.clone())
        .collect();
    changed.into_iter().collect()
}

/// Source of the paths changed between two revisions.
#[async_trait]
pub trait ChangedPathsProvider: Send + Sync {
    async fn changed_paths(&self, base_ref: &str, head_ref: &str) -> Result<Vec<String>, ChangesError>;

    /// Full commit SHA a ref name points at.
    async fn resolve_commit(&self, revision: &str) -> Result<String, ChangesError>;
}

/// `git diff --name-only base...head` in the repository root.
pub struct GitDiff {
    repo_root: PathBuf,
    timeout: Duration,
}

impl GitDiff {
    pub fn new(repo_root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            repo_root: repo_root.into(),
            timeout,
        }
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }
}

#[async_trait]
impl ChangedPathsProvider for GitDiff {
    async fn changed_paths(&self, base_ref: &str, head_ref: &str) -> Result<Vec<String>, ChangesError> {
        let range = format!("{}...{}", base_ref, head_ref);
        let output = run_command(
            "git",
            &["diff", "--name-only", range.as_str()],
            Some(&self.repo_root),
            self.timeout,
        )
        .await?;

        if !output.success {
            return Err(ChangesError::CommandFailed {
                range,
                stderr: output.stderr.trim().to_string(),
            });
        }

        let paths = parse_name_only(&output.stdout);
        info!("{} files changed in {}", paths.len(), range);
        debug!("Changed files: {:?}", paths);
        Ok(paths)
    }

    async fn resolve_commit(&self, revision: &str) -> Result<String, ChangesError> {
        let spec = format!("{}^{{commit}}", revision);
        let output = run_command(
            "git",
            &["rev-parse", "--verify", "--quiet", spec.as_str()],
            Some(&self.repo_root),
            self.timeout,
        )
        .await?;

        match parse_commit(&output.stdout).filter(|_| output.success) {
            Some(sha) => {
                debug!("{} is {}", revision, sha);
                Ok(sha)
            }
            None => Err(ChangesError::UnknownRevision {
                revision: revision.to_string(),
                stderr: output.stderr.trim().to_string(),
            }),
        }
    }
}

/// First line of `git rev-parse` output when it is a hex object name.
fn parse_commit(stdout: &str) -> Option<String> {
    let sha = stdout.lines().next()?.trim();
    let is_object_name = matches!(sha.len(), 40 | 64) && sha.chars().all(|c| c.is_ascii_hexdigit());
    is_object_name.then(|| sha.to_ascii_lowercase())
}

fn parse_name_only(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        nested_file = { "base-images/node-18-alpine/Dockerfile", true },
        deeply_nested = { "base-images/node-18-alpine/conf/a.conf", true },
        exact_directory = { "base-images/node-18-alpine", false },
        trailing_slash_only = { "base-images/node-18-alpine/", false },
        sibling_with_shared_prefix = { "base-images/node-18-alpine-slim/Dockerfile", false },
        unrelated = { "docker/automations/index.js", false },
        dot_slash = { "./base-images/node-18-alpine/Dockerfile", true },
    )]
    fn test_contains(path: &str, expected: bool) {
        let entry = WatchedDirectory::new("node-18-alpine", "base-images/node-18-alpine");
        assert_eq!(entry.contains(path), expected);
    }

    #[test]
    fn test_changed_by_prefix_entry_names() {
        let entries = vec![WatchedDirectory::new("node", "base-images/node-18-alpine")];
        assert_eq!(
            changed_by_prefix(&["base-images/node-18-alpine/Dockerfile"], &entries),
            vec!["node"]
        );
    }

    #[test]
    fn test_changed_by_prefix_sorted_unique() {
        let entries = vec![
            WatchedDirectory::new("telegram-bridge", "docker/telegram-bridge"),
            WatchedDirectory::new("automations", "docker/automations/"),
            WatchedDirectory::new("grafana", "docker/grafana"),
        ];
        let paths = [
            "docker/telegram-bridge/index.js",
            "docker/automations/package.json",
            "docker/automations/src/bot.js",
            "README.md",
        ];
        assert_eq!(
            changed_by_prefix(&paths, &entries),
            vec!["automations", "telegram-bridge"]
        );
    }

    #[test]
    fn test_empty_changed_paths() {
        let entries = vec![WatchedDirectory::new("a", "a")];
        assert!(changed_by_prefix::<&str>(&[], &entries).is_empty());
    }

    #[test]
    fn test_repository_root_directory_matches_everything() {
        for directory in ["", "."] {
            let entry = WatchedDirectory::new("root", directory);
            assert!(entry.contains("Dockerfile"));
            assert!(entry.contains("docker/app/index.js"));
            assert!(!entry.contains(""));
        }
    }

    #[parameterized(
        sha1 = { "1f4290ab6d3c2e8f90b1a7c5d4e3f2a1b0c9d8e7\n", Some("1f4290ab6d3c2e8f90b1a7c5d4e3f2a1b0c9d8e7") },
        uppercase = { "1F4290AB6D3C2E8F90B1A7C5D4E3F2A1B0C9D8E7", Some("1f4290ab6d3c2e8f90b1a7c5d4e3f2a1b0c9d8e7") },
        empty = { "", None },
        abbreviated = { "1f4290ab\n", None },
        ref_name = { "origin/master\n", None },
    )]
    fn test_parse_commit(stdout: &str, expected: Option<&str>) {
        assert_eq!(parse_commit(stdout).as_deref(), expected);
    }

    fn git(dir: &Path, args: &[&str]) -> bool {
        std::process::Command::new("git")
            .args(["-c", "user.name=ci", "-c", "user.email=ci@example.com", "-c", "commit.gpgsign=false"])
            .args(args)
            .current_dir(dir)
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    #[tokio::test]
    async fn test_git_resolves_refs_to_commits() {
        let dir = tempfile::TempDir::new().unwrap();
        if !git(dir.path(), &["init", "-q"])
            || !git(dir.path(), &["commit", "-q", "--allow-empty", "-m", "init"])
        {
            eprintln!("git unavailable, skipping");
            return;
        }
        let provider = GitDiff::new(dir.path(), Duration::from_secs(30));

        let sha = provider.resolve_commit("HEAD").await.unwrap();
        assert_eq!(sha.len(), 40);
        assert!(sha.chars().all(|c| c.is_ascii_hexdigit()));

        let err = provider.resolve_commit("origin/no-such-branch").await.unwrap_err();
        assert!(matches!(err, ChangesError::UnknownRevision { .. }));
        assert!(err.to_string().contains("origin/no-such-branch"));
    }

    #[test]
    fn test_parse_name_only() {
        assert_eq!(
            parse_name_only("a/b.txt\n\n  c.txt  \n"),
            vec!["a/b.txt", "c.txt"]
        );
        assert!(parse_name_only("").is_empty());
    }
}
