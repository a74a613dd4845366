//! Base image → dependent services
//!
//! Two levels only: base images never depend on each other, services never
//! depend on services.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, warn};

use crate::catalog::{GhcrMapping, ServiceEntry};
use crate::dockerfile::Dockerfile;
use crate::fs::FileSystem;
use crate::util::OrderedSet;

/// Base-image directory → services built on it, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReverseDependencyMap {
    dependents: BTreeMap<String, OrderedSet<String>>,
}

impl ReverseDependencyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, directory: &str, service: &str) {
        self.dependents
            .entry(directory.to_string())
            .or_default()
            .insert(service.to_string());
    }

    pub fn dependents_of(&self, directory: &str) -> &[String] {
        self.dependents
            .get(directory)
            .map(OrderedSet::as_slice)
            .unwrap_or(&[])
    }

    /// Base-image directories `service` depends on, sorted.
    pub fn dependencies_of(&self, service: &str) -> Vec<String> {
        self.dependents
            .iter()
            .filter(|(_, services)| services.contains(&service.to_string()))
            .map(|(directory, _)| directory.clone())
            .collect()
    }

    pub fn directories(&self) -> impl Iterator<Item = &str> {
        self.dependents.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.dependents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dependents.is_empty()
    }
}

/// Images a service build pulls from: every stage image, then external
/// `COPY --from` sources.
fn referenced_images(dockerfile: &Dockerfile) -> OrderedSet<String> {
    dockerfile
        .stage_references()
        .into_iter()
        .map(|r| r.image)
        .chain(dockerfile.external_copy_sources())
        .collect()
}

/// Scans every service build file for catalog base images.
///
/// Unreadable build files drop that service from the map.
pub fn reverse_map<F: FileSystem>(
    fs: &F,
    services: &[ServiceEntry],
    mapping: &GhcrMapping,
) -> ReverseDependencyMap {
    let mut map = ReverseDependencyMap::new();

    for service in services {
        let text = match fs.read_to_string(&service.dockerfile_path) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Skipping dependencies of {}: {:#}",
                    service.service_name, e
                );
                continue;
            }
        };

        for image in referenced_images(&Dockerfile::parse(&text)).iter() {
            if let Some(directory) = mapping.dir_for(image) {
                debug!("{} depends on base image {}", service.service_name, directory);
                map.add(directory, &service.service_name);
            }
        }
    }

    map
}

/// Services depending on any of `changed_dirs`, sorted and unique.
pub fn affected_services<S: AsRef<str>>(
    changed_dirs: &[S],
    reverse_map: &ReverseDependencyMap,
) -> Vec<String> {
    changed_dirs
        .iter()
        .flat_map(|dir| reverse_map.dependents_of(dir.as_ref()))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
