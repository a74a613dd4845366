//! Build-file checks
//!
//! A narrow rule set: stage references must be fixed image names, and
//! base-image build files must mirror their upstream image without adding
//! layers.

pub mod rules;
pub mod validator;

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::dockerfile::Dockerfile;
use crate::fs::FileSystem;

pub use rules::{ExactCopyRule, HasFromRule, NoVariableInFromRule, ValidationRule};
pub use validator::{ValidationReport, Validator, Violation};

/// Instructions a base-image build file may contain.
pub const EXACT_COPY_ALLOWED: &[&str] = &["FROM", "LABEL", "ARG", "HEALTHCHECK"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(
        "FROM on line {line} uses variable substitution in '{image}': \
         ARG values are not allowed in FROM, use a fixed image reference"
    )]
    VariableInFrom { image: String, line: usize },

    #[error(
        "{path} contains {}: base images must be exact copies of upstream images \
         (allowed instructions: FROM, LABEL, ARG, HEALTHCHECK)",
        instructions.join(", ")
    )]
    NotExactCopy {
        path: String,
        instructions: Vec<String>,
    },

    #[error("{path} has no FROM instruction")]
    MissingFrom { path: String },

    #[error("cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("required field '{0}' is empty")]
    EmptyField(&'static str),
}

/// Which side of the catalog a build file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildFileKind {
    BaseImage,
    Service,
}

/// A build file queued for validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub path: PathBuf,
    pub kind: BuildFileKind,
}

impl BuildTarget {
    pub fn base_image(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: BuildFileKind::BaseImage,
        }
    }

    pub fn service(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: BuildFileKind::Service,
        }
    }
}

/// A parsed build file handed to the rules.
#[derive(Debug, Clone)]
pub struct BuildFile {
    pub path: PathBuf,
    pub kind: BuildFileKind,
    pub dockerfile: Dockerfile,
}

impl BuildFile {
    pub fn new(path: impl Into<PathBuf>, kind: BuildFileKind, text: &str) -> Self {
        Self {
            path: path.into(),
            kind,
            dockerfile: Dockerfile::parse(text),
        }
    }

    pub fn load<F: FileSystem>(fs: &F, target: &BuildTarget) -> Result<Self, ValidationError> {
        let text = fs
            .read_to_string(&target.path)
            .map_err(|e| ValidationError::Unreadable {
                path: target.path.display().to_string(),
                reason: format!("{:#}", e),
            })?;
        Ok(Self::new(target.path.clone(), target.kind, &text))
    }

    pub fn display_path(&self) -> String {
        self.path.display().to_string()
    }
}

/// Checks that a base-image build file only mirrors its upstream image.
///
/// A missing or unreadable file is an error, not a pass.
pub fn validate_base_image_exact_copy<F: FileSystem>(
    fs: &F,
    path: &Path,
) -> Result<(), ValidationError> {
    let file = BuildFile::load(fs, &BuildTarget::base_image(path))?;
    ExactCopyRule.validate(&file)
}
