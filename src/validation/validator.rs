use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, warn};

use super::rules::{ExactCopyRule, HasFromRule, NoVariableInFromRule, ValidationRule};
use super::{BuildFile, BuildTarget, ValidationError};
use crate::fs::FileSystem;

/// Rule name recorded for files that could not be read.
pub const READABLE_RULE: &str = "Readable";

pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }

    /// Stops at the first failing rule.
    pub fn validate(&self, file: &BuildFile) -> Result<(), ValidationError> {
        for rule in self.rules.iter().filter(|r| r.applies_to(file.kind)) {
            rule.validate(file)?;
        }
        Ok(())
    }

    /// Runs every applicable rule over every target and collects all violations.
    pub fn validate_all<F: FileSystem>(&self, fs: &F, targets: &[BuildTarget]) -> ValidationReport {
        let mut report = ValidationReport::default();

        for target in targets {
            report.checked += 1;
            let file = match BuildFile::load(fs, target) {
                Ok(file) => file,
                Err(e) => {
                    warn!("Skipping rules for {}: {}", target.path.display(), e);
                    report.push(target.path.clone(), READABLE_RULE, e);
                    continue;
                }
            };

            for rule in self.rules.iter().filter(|r| r.applies_to(file.kind)) {
                match rule.validate(&file) {
                    Ok(()) => debug!("[{}] {} ok", rule.name(), target.path.display()),
                    Err(e) => report.push(target.path.clone(), rule.name(), e),
                }
            }
        }

        report
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            rules: vec![
                Box::new(HasFromRule),
                Box::new(NoVariableInFromRule),
                Box::new(ExactCopyRule),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    pub path: PathBuf,
    pub rule: &'static str,
    #[serde(serialize_with = "serialize_error")]
    pub error: ValidationError,
}

fn serialize_error<S: serde::Serializer>(
    error: &ValidationError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Every violation found in one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub checked: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    fn push(&mut self, path: PathBuf, rule: &'static str, error: ValidationError) {
        self.violations.push(Violation { path, rule, error });
    }

    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }

    /// `Err(self)` when any violation was found.
    pub fn into_result(self) -> Result<(), Self> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            return write!(f, "{} build files checked, no violations", self.checked);
        }
        writeln!(
            f,
            "{} violation(s) in {} build files checked:",
            self.violations.len(),
            self.checked
        )?;
        for violation in &self.violations {
            writeln!(
                f,
                "  [{}] {}: {}",
                violation.rule,
                violation.path.display(),
                violation.error
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use crate::validation::BuildFileKind;

    #[test]
    fn test_validator_passes_clean_files() {
        let validator = Validator::new();
        let base = BuildFile::new("b/Dockerfile", BuildFileKind::BaseImage, "FROM node:18\n");
        let service = BuildFile::new(
            "s/Dockerfile",
            BuildFileKind::Service,
            "FROM ghcr.io/groupsky/homy/node:18\nRUN npm ci\n",
        );
        assert!(validator.validate(&base).is_ok());
        assert!(validator.validate(&service).is_ok());
    }

    #[test]
    fn test_validator_stops_at_first_error() {
        let validator = Validator::new();
        let file = BuildFile::new("b/Dockerfile", BuildFileKind::BaseImage, "RUN x\n");
        assert!(matches!(
            validator.validate(&file),
            Err(ValidationError::MissingFrom { .. })
        ));
    }

    #[test]
    fn test_validate_all_collects_every_violation() {
        let fs = MockFileSystem::new();
        fs.add_file("base-images/ok/Dockerfile", "FROM alpine:3.22.1\n");
        fs.add_file(
            "base-images/bad/Dockerfile",
            "ARG V\nFROM alpine:$V\nRUN apk add curl\n",
        );
        fs.add_file("app/Dockerfile", "FROM ghcr.io/groupsky/homy/alpine:3.22.1\nRUN true\n");

        let targets = vec![
            BuildTarget::base_image("base-images/ok/Dockerfile"),
            BuildTarget::base_image("base-images/bad/Dockerfile"),
            BuildTarget::base_image("base-images/missing/Dockerfile"),
            BuildTarget::service("app/Dockerfile"),
        ];
        let report = Validator::new().validate_all(&fs, &targets);

        assert_eq!(report.checked, 4);
        let rules: Vec<_> = report.violations.iter().map(|v| v.rule).collect();
        assert_eq!(rules, vec!["NoVariableInFrom", "ExactCopy", READABLE_RULE]);
        assert!(!report.is_ok());

        let text = report.to_string();
        assert!(text.contains("3 violation(s)"));
        assert!(text.contains("base-images/bad/Dockerfile"));
        assert!(report.into_result().is_err());
    }

    #[test]
    fn test_report_serializes_errors_as_messages() {
        let mut report = ValidationReport::default();
        report.push(
            PathBuf::from("x/Dockerfile"),
            "HasFrom",
            ValidationError::MissingFrom {
                path: "x/Dockerfile".to_string(),
            },
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json["violations"][0]["error"],
            "x/Dockerfile has no FROM instruction"
        );
    }
}
