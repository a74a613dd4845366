use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use super::{DetectionResult, REQUIRED_OUTPUT_KEYS};

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Missing required output keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),

    #[error("failed to serialize output {key}: {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write outputs to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Output key → JSON-encoded value, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputMap {
    entries: Vec<(String, String)>,
}

impl OutputMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key`, replacing an earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Compact JSON array per list (`[]` when empty).
pub fn generate_outputs(result: &DetectionResult) -> Result<OutputMap, OutputError> {
    let mut outputs = OutputMap::new();
    for (key, list) in result.lists() {
        let value = serde_json::to_string(list).map_err(|source| OutputError::Serialize {
            key: key.to_string(),
            source,
        })?;
        outputs.insert(key, value);
    }
    Ok(outputs)
}

/// Every required key must be present; extra keys are fine.
pub fn validate_outputs(outputs: &OutputMap) -> Result<(), OutputError> {
    let missing: Vec<String> = REQUIRED_OUTPUT_KEYS
        .iter()
        .filter(|key| !outputs.contains_key(key))
        .map(|key| key.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(OutputError::MissingKeys(missing))
    }
}

/// `key=value` lines.
pub fn write_outputs<W: Write>(writer: &mut W, outputs: &OutputMap) -> std::io::Result<()> {
    for (key, value) in outputs.iter() {
        writeln!(writer, "{}={}", key, value)?;
    }
    Ok(())
}

/// Appends validated outputs to the CI output file.
pub fn write_github_output(path: &Path, outputs: &OutputMap) -> Result<(), OutputError> {
    validate_outputs(outputs)?;

    let write_error = |source: std::io::Error| OutputError::Write {
        path: path.display().to_string(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_error)?;
    write_outputs(&mut file, outputs).map_err(write_error)?;

    info!("Wrote {} outputs to {}", outputs.len(), path.display());
    Ok(())
}
