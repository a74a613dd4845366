use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use super::DEFAULT_DOCKERFILE;
use crate::dockerfile::Dockerfile;
use crate::fs::FileSystem;
use crate::version::normalize_version;

/// Directory prefix whose images all publish under the `node` name.
pub const NODE_FAMILY_PREFIX: &str = "node-";

const LATEST: &str = "latest";

/// One mirrored upstream image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BaseImageEntry {
    pub directory: String,
    pub dockerfile_path: PathBuf,
    pub upstream_image: String,
    pub image_name: String,
    pub raw_version: Option<String>,
}

impl BaseImageEntry {
    pub fn canonical_tag(&self, registry_root: &str) -> String {
        canonical_tag(registry_root, &self.directory, self.raw_version.as_deref())
    }

    fn load<F: FileSystem>(fs: &F, directory: &str, dockerfile_path: PathBuf) -> Option<Self> {
        let text = match fs.read_to_string(&dockerfile_path) {
            Ok(text) => text,
            Err(e) => {
                warn!("Skipping base image {}: {:#}", directory, e);
                return None;
            }
        };

        let Some(upstream) = Dockerfile::parse(&text).upstream() else {
            warn!("Skipping base image {}: no FROM instruction", directory);
            return None;
        };

        Some(Self {
            directory: directory.to_string(),
            dockerfile_path,
            upstream_image: upstream.upstream_image,
            image_name: upstream.image_name,
            raw_version: upstream.version_tag,
        })
    }
}

/// `(directory, build file)` for every base-image directory under
/// `base_dir` that has a `Dockerfile`, sorted by directory name.
///
/// Missing or non-directory roots yield nothing; hidden directories are
/// skipped.
pub fn base_image_dockerfiles<F: FileSystem>(fs: &F, base_dir: &Path) -> Vec<(String, PathBuf)> {
    if !fs.is_dir(base_dir) {
        debug!("Base image directory {} not found", base_dir.display());
        return Vec::new();
    }

    let mut dirs = match fs.read_dir(base_dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list {}: {:#}", base_dir.display(), e);
            return Vec::new();
        }
    };
    dirs.retain(|entry| entry.is_dir() && !entry.is_hidden());
    dirs.sort_by(|a, b| a.file_name().cmp(b.file_name()));

    dirs.iter()
        .filter_map(|dir| {
            let dockerfile_path = dir.path().join(DEFAULT_DOCKERFILE);
            if fs.is_file(&dockerfile_path) {
                Some((dir.file_name().to_string(), dockerfile_path))
            } else {
                debug!("{} has no {}", dir.file_name(), DEFAULT_DOCKERFILE);
                None
            }
        })
        .collect()
}

/// Every base image under `base_dir`, sorted by directory name.
///
/// Build files without a `FROM` are skipped.
pub fn discover<F: FileSystem>(fs: &F, base_dir: &Path) -> Vec<BaseImageEntry> {
    let entries: Vec<_> = base_image_dockerfiles(fs, base_dir)
        .into_iter()
        .filter_map(|(directory, dockerfile_path)| {
            BaseImageEntry::load(fs, &directory, dockerfile_path)
        })
        .collect();

    debug!("Discovered {} base images in {}", entries.len(), base_dir.display());
    entries
}

/// Registry tag a base-image directory publishes to.
///
/// `{registry_root}/{image_name}:{normalized_version}` where the image name
/// is the directory name, except that `node-*` directories all become `node`.
/// A missing version becomes `latest`.
pub fn canonical_tag(registry_root: &str, directory: &str, raw_version: Option<&str>) -> String {
    let version = match raw_version.map(str::trim) {
        Some(v) if !v.is_empty() => normalize_version(v),
        _ => LATEST.to_string(),
    };
    let image_name = if directory.starts_with(NODE_FAMILY_PREFIX) {
        "node"
    } else {
        directory
    };
    format!("{}/{}:{}", registry_root, image_name, version)
}

/// Directory ⇄ canonical tag, kept inverse-consistent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GhcrMapping {
    pub dir_to_tag: BTreeMap<String, String>,
    pub tag_to_dir: BTreeMap<String, String>,
}

impl GhcrMapping {
    pub fn from_entries(entries: &[BaseImageEntry], registry_root: &str) -> Self {
        let mut mapping = Self::default();
        for entry in entries {
            mapping.insert(entry.directory.clone(), entry.canonical_tag(registry_root));
        }
        mapping
    }

    fn insert(&mut self, directory: String, tag: String) {
        if let Some(previous) = self.tag_to_dir.get(&tag) {
            warn!(
                "Base images {} and {} both publish {}",
                previous, directory, tag
            );
        }
        self.tag_to_dir.insert(tag.clone(), directory.clone());
        self.dir_to_tag.insert(directory, tag);
    }

    pub fn tag_for(&self, directory: &str) -> Option<&str> {
        self.dir_to_tag.get(directory).map(String::as_str)
    }

    pub fn dir_for(&self, tag: &str) -> Option<&str> {
        self.tag_to_dir.get(tag).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.dir_to_tag.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dir_to_tag.is_empty()
    }
}

pub fn build_mapping<F: FileSystem>(fs: &F, base_dir: &Path, registry_root: &str) -> GhcrMapping {
    GhcrMapping::from_entries(&discover(fs, base_dir), registry_root)
}

/// Discovered base images together with their tag mapping.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BaseImageCatalog {
    pub entries: Vec<BaseImageEntry>,
    pub mapping: GhcrMapping,
}

impl BaseImageCatalog {
    pub fn load<F: FileSystem>(fs: &F, base_dir: &Path, registry_root: &str) -> Self {
        let entries = discover(fs, base_dir);
        let mapping = GhcrMapping::from_entries(&entries, registry_root);
        Self { entries, mapping }
    }

    pub fn directories(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.directory.clone()).collect()
    }

    pub fn get(&self, directory: &str) -> Option<&BaseImageEntry> {
        self.entries.iter().find(|e| e.directory == directory)
    }
}
