//! Image tag normalization
//!
//! Upstream tags carry OS point releases (`18.20.8-alpine3.21`) that change
//! independently of the application version. Mirrored base images drop them
//! so that service build files can reference a stable tag.

use std::sync::OnceLock;

use regex::Regex;

fn os_suffix_patterns() -> &'static [(Regex, &'static str)] {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (Regex::new(r"alpine\d+(?:\.\d+)*").expect("valid regex"), "alpine"),
            (Regex::new(r"debian\d+").expect("valid regex"), "debian"),
            (Regex::new(r"ubuntu\d+(?:\.\d+)*").expect("valid regex"), "ubuntu"),
        ]
    })
}

fn semver_core_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+(?:\.\d+){1,3}").expect("valid regex"))
}

/// Strips OS release numbers from `alpine`, `debian` and `ubuntu` suffixes.
///
/// Every occurrence is rewritten; anything else is left untouched, and
/// applying it twice gives the same result as applying it once.
pub fn normalize_version(version: &str) -> String {
    os_suffix_patterns()
        .iter()
        .fold(version.to_string(), |acc, (pattern, family)| {
            pattern.replace_all(&acc, *family).into_owned()
        })
}

/// Leading numeric version (`1.6.23` out of `v1.6.23-openssl-alpine`).
///
/// One leading `v`/`V` is dropped first. Falls back to the prefix-stripped
/// input when it does not start with a dotted number.
pub fn extract_semver_core(version: &str) -> String {
    let stripped = version
        .strip_prefix('v')
        .or_else(|| version.strip_prefix('V'))
        .unwrap_or(version);

    semver_core_pattern()
        .find(stripped)
        .map(|m| m.as_str())
        .unwrap_or(stripped)
        .to_string()
}
