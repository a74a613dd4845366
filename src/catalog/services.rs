use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::DEFAULT_DOCKERFILE;
use crate::validation::ValidationError;

/// One service as printed by `docker compose config --format json`.
///
/// Only the fields discovery needs; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceDefinition {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub build: Option<BuildDirective>,
}

/// `build:` is either a bare context path or a structured spec.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BuildDirective {
    Context(String),
    Spec(BuildSpec),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildSpec {
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub dockerfile: Option<String>,
    #[serde(default)]
    pub args: Option<Value>,
}

impl BuildDirective {
    /// Trimmed context and build-file name, `None` without a usable context.
    fn context_and_dockerfile(&self) -> Option<(String, String)> {
        let (context, dockerfile) = match self {
            BuildDirective::Context(context) => (context.as_str(), None),
            BuildDirective::Spec(spec) => (spec.context.as_deref()?, spec.dockerfile.as_deref()),
        };

        let context = context.trim();
        if context.is_empty() {
            return None;
        }
        let dockerfile = dockerfile
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DOCKERFILE);

        Some((context.to_string(), dockerfile.to_string()))
    }

    fn args(&self) -> Option<Value> {
        match self {
            BuildDirective::Spec(spec) => spec.args.clone(),
            BuildDirective::Context(_) => None,
        }
    }
}

/// A buildable service publishing to the project registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceEntry {
    pub service_name: String,
    pub image: String,
    pub build_context: PathBuf,
    pub dockerfile_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_args: Option<Value>,
}

impl ServiceEntry {
    /// Relative `dockerfile` names resolve against the build context.
    pub fn new(
        service_name: impl Into<String>,
        image: impl Into<String>,
        build_context: impl Into<PathBuf>,
        dockerfile: impl AsRef<Path>,
        build_args: Option<Value>,
    ) -> Result<Self, ValidationError> {
        let service_name = service_name.into();
        let image = image.into();
        let build_context = build_context.into();
        let dockerfile = dockerfile.as_ref();

        if service_name.trim().is_empty() {
            return Err(ValidationError::EmptyField("service_name"));
        }
        if image.trim().is_empty() {
            return Err(ValidationError::EmptyField("image"));
        }
        if build_context.as_os_str().is_empty() {
            return Err(ValidationError::EmptyField("build_context"));
        }
        if dockerfile.as_os_str().is_empty() {
            return Err(ValidationError::EmptyField("dockerfile_path"));
        }

        let dockerfile_path = build_context.join(dockerfile);
        Ok(Self {
            service_name,
            image,
            build_context,
            dockerfile_path,
            build_args,
        })
    }

    /// Builds an entry from one resolved compose definition.
    ///
    /// `None` when the service has no build directive, no context or no image,
    /// or when the definition does not have the expected shape.
    pub fn from_definition(service_name: &str, definition: &Value) -> Option<Self> {
        let definition: ServiceDefinition = match serde_json::from_value(definition.clone()) {
            Ok(definition) => definition,
            Err(e) => {
                warn!("Skipping service {}: malformed definition: {}", service_name, e);
                return None;
            }
        };

        let build = definition.build?;
        let Some((context, dockerfile)) = build.context_and_dockerfile() else {
            debug!("Skipping service {}: build has no context", service_name);
            return None;
        };
        let image = definition.image.map(|i| i.trim().to_string())?;

        match Self::new(service_name, image, context, dockerfile, build.args()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping service {}: {}", service_name, e);
                None
            }
        }
    }

    pub fn publishes_to(&self, registry_root: &str) -> bool {
        self.image
            .strip_prefix(registry_root)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
    }
}

/// Services that build from source and publish under `{registry_root}/`.
///
/// Services sharing a build context stay separate entries. Output follows the
/// map's key order.
pub fn discover(resolved: &BTreeMap<String, Value>, registry_root: &str) -> Vec<ServiceEntry> {
    let entries: Vec<_> = resolved
        .iter()
        .filter_map(|(name, definition)| ServiceEntry::from_definition(name, definition))
        .filter(|entry| {
            let keep = entry.publishes_to(registry_root);
            if !keep {
                debug!(
                    "Skipping service {}: {} is outside {}",
                    entry.service_name, entry.image, registry_root
                );
            }
            keep
        })
        .collect();

    debug!("Discovered {} registry services", entries.len());
    entries
}
