use super::{BuildFile, BuildFileKind, ValidationError, EXACT_COPY_ALLOWED};
use crate::util::OrderedSet;

pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn applies_to(&self, _kind: BuildFileKind) -> bool {
        true
    }

    fn validate(&self, file: &BuildFile) -> Result<(), ValidationError>;
}

pub struct NoVariableInFromRule;

impl ValidationRule for NoVariableInFromRule {
    fn name(&self) -> &'static str {
        "NoVariableInFrom"
    }

    fn validate(&self, file: &BuildFile) -> Result<(), ValidationError> {
        file.dockerfile.validate_no_variable_in_stage_reference()
    }
}

pub struct HasFromRule;

impl ValidationRule for HasFromRule {
    fn name(&self) -> &'static str {
        "HasFrom"
    }

    fn validate(&self, file: &BuildFile) -> Result<(), ValidationError> {
        if file.dockerfile.stage_references().is_empty() {
            return Err(ValidationError::MissingFrom {
                path: file.display_path(),
            });
        }
        Ok(())
    }
}

/// Base images are mirrors: no build steps of their own.
pub struct ExactCopyRule;

impl ValidationRule for ExactCopyRule {
    fn name(&self) -> &'static str {
        "ExactCopy"
    }

    fn applies_to(&self, kind: BuildFileKind) -> bool {
        kind == BuildFileKind::BaseImage
    }

    fn validate(&self, file: &BuildFile) -> Result<(), ValidationError> {
        let forbidden: OrderedSet<String> = file
            .dockerfile
            .instructions()
            .iter()
            .filter(|i| !EXACT_COPY_ALLOWED.contains(&i.keyword.as_str()))
            .map(|i| i.keyword.clone())
            .collect();

        if forbidden.is_empty() {
            return Ok(());
        }
        Err(ValidationError::NotExactCopy {
            path: file.display_path(),
            instructions: forbidden.into_vec(),
        })
    }
}
