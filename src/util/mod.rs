//! Utility modules for buildscope
//!
//! - Structured logging setup and configuration
//! - Insertion-ordered unique collections

pub mod logging;
pub mod ordered_set;

pub use logging::{init_logging, LoggingConfig};
pub use ordered_set::OrderedSet;
