//! Per-service facts used to pick CI follow-up jobs

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::fs::FileSystem;

/// Test script `npm init` writes by default.
pub const NPM_PLACEHOLDER_TEST: &str = "no test specified";

/// Whether the build context has a `package.json` with a real `test` script.
pub fn has_real_tests<F: FileSystem>(fs: &F, context_dir: &Path) -> bool {
    let manifest = context_dir.join("package.json");
    let Ok(text) = fs.read_to_string(&manifest) else {
        return false;
    };

    let package: Value = match serde_json::from_str(&text) {
        Ok(package) => package,
        Err(e) => {
            debug!("Ignoring unparseable {}: {}", manifest.display(), e);
            return false;
        }
    };

    match package.pointer("/scripts/test").and_then(Value::as_str) {
        Some(script) => !script.trim().is_empty() && !script.contains(NPM_PLACEHOLDER_TEST),
        None => false,
    }
}
