//! Detection result and its CI key/value rendering

mod github;

pub use github::{
    generate_outputs, validate_outputs, write_github_output, write_outputs, OutputError, OutputMap,
};

use serde::{Deserialize, Serialize};

/// Keys every run must publish, in publication order.
pub const REQUIRED_OUTPUT_KEYS: [&str; 10] = [
    "base_images",
    "changed_base_images",
    "base_images_needed",
    "changed_services",
    "affected_services",
    "to_build",
    "to_retag",
    "testable_services",
    "healthcheck_services",
    "version_check_services",
];

/// Everything a detection run decided. Every list is sorted or keeps
/// discovery order; none contains duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub base_images: Vec<String>,
    pub changed_base_images: Vec<String>,
    pub base_images_needed: Vec<String>,
    pub changed_services: Vec<String>,
    pub affected_services: Vec<String>,
    pub to_build: Vec<String>,
    pub to_retag: Vec<String>,
    pub testable_services: Vec<String>,
    pub healthcheck_services: Vec<String>,
    pub version_check_services: Vec<String>,
}

impl DetectionResult {
    /// `(key, list)` pairs in [`REQUIRED_OUTPUT_KEYS`] order.
    pub fn lists(&self) -> [(&'static str, &[String]); 10] {
        [
            ("base_images", self.base_images.as_slice()),
            ("changed_base_images", self.changed_base_images.as_slice()),
            ("base_images_needed", self.base_images_needed.as_slice()),
            ("changed_services", self.changed_services.as_slice()),
            ("affected_services", self.affected_services.as_slice()),
            ("to_build", self.to_build.as_slice()),
            ("to_retag", self.to_retag.as_slice()),
            ("testable_services", self.testable_services.as_slice()),
            ("healthcheck_services", self.healthcheck_services.as_slice()),
            ("version_check_services", self.version_check_services.as_slice()),
        ]
    }

    pub fn has_work(&self) -> bool {
        !self.to_build.is_empty() || !self.to_retag.is_empty() || !self.base_images_needed.is_empty()
    }
}
