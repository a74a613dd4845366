//! Base-image and service discovery
//!
//! Base images are mirrored upstream images, one directory each under the
//! base-image root. Services come from the resolved compose configuration and
//! are kept only when they publish to the project registry.

pub mod base_images;
pub mod services;

pub use base_images::{
    base_image_dockerfiles, build_mapping, canonical_tag, BaseImageCatalog, BaseImageEntry,
    GhcrMapping,
};
pub use services::{BuildDirective, BuildSpec, ServiceDefinition, ServiceEntry};

/// Build-file name used when a build directive does not name one.
pub const DEFAULT_DOCKERFILE: &str = "Dockerfile";
