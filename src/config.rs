//! Configuration management for buildscope
//!
//! Settings load from environment variables with defaults matching the
//! repository layout buildscope was written for. Command-line flags override
//! individual fields after loading.
//!
//! # Environment Variables
//!
//! - `BUILDSCOPE_REGISTRY_ROOT`: registry namespace services publish to - default: "ghcr.io/groupsky/homy"
//! - `BUILDSCOPE_BASE_IMAGES_DIR`: base-image mirrors, relative to the repository - default: "base-images"
//! - `BUILDSCOPE_COMPOSE_FILE`: compose file - default: "docker-compose.yml"
//! - `BUILDSCOPE_COMPOSE_ENV_FILE`: env file passed to compose - default: "example.env"
//! - `BUILDSCOPE_CHECK_ATTEMPTS`: attempts per registry check (1-10) - default: "3"
//! - `BUILDSCOPE_CHECK_TIMEOUT`: seconds per registry check attempt - default: "30"
//! - `BUILDSCOPE_COMMAND_TIMEOUT`: seconds for git and compose commands - default: "120"
//! - `BUILDSCOPE_BACKOFF_UNIT_MS`: first retry delay, doubled per attempt - default: "1000"
//! - `BUILDSCOPE_LOG_LEVEL`: logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use buildscope::BuildscopeConfig;
//!
//! let config = BuildscopeConfig::default();
//! config.validate().expect("Invalid configuration");
//! println!("{}", config);
//! ```

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_REGISTRY_ROOT: &str = "ghcr.io/groupsky/homy";
pub const DEFAULT_BASE_IMAGES_DIR: &str = "base-images";
pub const DEFAULT_COMPOSE_FILE: &str = "docker-compose.yml";
pub const DEFAULT_COMPOSE_ENV_FILE: &str = "example.env";
const DEFAULT_CHECK_ATTEMPTS: u32 = 3;
const DEFAULT_CHECK_TIMEOUT_SECS: u64 = 30;
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;
const DEFAULT_BACKOFF_UNIT_MS: u64 = 1000;
const DEFAULT_LOG_LEVEL: &str = "info";

const MAX_CHECK_ATTEMPTS: u32 = 10;
const MAX_TIMEOUT_SECS: u64 = 600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildscopeConfig {
    /// Registry namespace; services outside it are ignored
    pub registry_root: String,

    pub base_images_dir: String,

    pub compose_file: String,

    pub compose_env_file: String,

    /// Attempts per registry existence check
    pub check_attempts: u32,

    /// Per-attempt limit for a registry check, in seconds
    pub check_timeout_secs: u64,

    /// Limit for git and compose commands, in seconds
    pub command_timeout_secs: u64,

    pub backoff_unit_ms: u64,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Default for BuildscopeConfig {
    /// Reads `BUILDSCOPE_*` variables, falling back to defaults for missing or
    /// unparseable values.
    fn default() -> Self {
        Self {
            registry_root: env_or("BUILDSCOPE_REGISTRY_ROOT", DEFAULT_REGISTRY_ROOT),
            base_images_dir: env_or("BUILDSCOPE_BASE_IMAGES_DIR", DEFAULT_BASE_IMAGES_DIR),
            compose_file: env_or("BUILDSCOPE_COMPOSE_FILE", DEFAULT_COMPOSE_FILE),
            compose_env_file: env_or("BUILDSCOPE_COMPOSE_ENV_FILE", DEFAULT_COMPOSE_ENV_FILE),
            check_attempts: env_parsed("BUILDSCOPE_CHECK_ATTEMPTS", DEFAULT_CHECK_ATTEMPTS),
            check_timeout_secs: env_parsed("BUILDSCOPE_CHECK_TIMEOUT", DEFAULT_CHECK_TIMEOUT_SECS),
            command_timeout_secs: env_parsed(
                "BUILDSCOPE_COMMAND_TIMEOUT",
                DEFAULT_COMMAND_TIMEOUT_SECS,
            ),
            backoff_unit_ms: env_parsed("BUILDSCOPE_BACKOFF_UNIT_MS", DEFAULT_BACKOFF_UNIT_MS),
            log_level: env_or("BUILDSCOPE_LOG_LEVEL", DEFAULT_LOG_LEVEL).to_lowercase(),
        }
    }
}

impl BuildscopeConfig {
    /// Validates the configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if any validation fails
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.registry_root.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "Registry root cannot be empty".to_string(),
            ));
        }
        if self.registry_root.ends_with('/') {
            return Err(ConfigError::ValidationFailed(format!(
                "Registry root must not end with '/': {}",
                self.registry_root
            )));
        }

        if !(1..=MAX_CHECK_ATTEMPTS).contains(&self.check_attempts) {
            return Err(ConfigError::ValidationFailed(format!(
                "Check attempts must be between 1 and {}",
                MAX_CHECK_ATTEMPTS
            )));
        }

        for (name, secs) in [
            ("Check timeout", self.check_timeout_secs),
            ("Command timeout", self.command_timeout_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} must be at least 1 second",
                    name
                )));
            }
            if secs > MAX_TIMEOUT_SECS {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} cannot exceed 10 minutes",
                    name
                )));
            }
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_secs(self.check_timeout_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }
}

impl fmt::Display for BuildscopeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Buildscope Configuration:")?;
        writeln!(f, "  Registry Root: {}", self.registry_root)?;
        writeln!(f, "  Base Images Dir: {}", self.base_images_dir)?;
        writeln!(
            f,
            "  Compose: {} (env {})",
            self.compose_file, self.compose_env_file
        )?;
        writeln!(
            f,
            "  Registry Checks: {} attempts, {}s each, backoff {}ms",
            self.check_attempts, self.check_timeout_secs, self.backoff_unit_ms
        )?;
        writeln!(f, "  Command Timeout: {}s", self.command_timeout_secs)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    /// Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        old_value: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let old_value = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                old_value,
            }
        }

        fn unset(key: &str) -> Self {
            let old_value = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                old_value,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.old_value {
                Some(v) => env::set_var(&self.key, v),
                None => env::remove_var(&self.key),
            }
        }
    }

    fn valid_config() -> BuildscopeConfig {
        BuildscopeConfig {
            registry_root: DEFAULT_REGISTRY_ROOT.to_string(),
            base_images_dir: DEFAULT_BASE_IMAGES_DIR.to_string(),
            compose_file: DEFAULT_COMPOSE_FILE.to_string(),
            compose_env_file: DEFAULT_COMPOSE_ENV_FILE.to_string(),
            check_attempts: 3,
            check_timeout_secs: 30,
            command_timeout_secs: 120,
            backoff_unit_ms: 1000,
            log_level: "info".to_string(),
        }
    }

    #[test]
    #[serial]
    fn test_default_configuration() {
        let _guards = [
            "BUILDSCOPE_REGISTRY_ROOT",
            "BUILDSCOPE_BASE_IMAGES_DIR",
            "BUILDSCOPE_COMPOSE_FILE",
            "BUILDSCOPE_COMPOSE_ENV_FILE",
            "BUILDSCOPE_CHECK_ATTEMPTS",
            "BUILDSCOPE_CHECK_TIMEOUT",
            "BUILDSCOPE_COMMAND_TIMEOUT",
            "BUILDSCOPE_BACKOFF_UNIT_MS",
            "BUILDSCOPE_LOG_LEVEL",
        ]
        .map(EnvGuard::unset);

        assert_eq!(BuildscopeConfig::default(), valid_config());
    }

    #[test]
    #[serial]
    fn test_environment_variable_parsing() {
        let _guards = vec![
            EnvGuard::set("BUILDSCOPE_REGISTRY_ROOT", "registry.example.com/team"),
            EnvGuard::set("BUILDSCOPE_CHECK_ATTEMPTS", "5"),
            EnvGuard::set("BUILDSCOPE_CHECK_TIMEOUT", " 45 "),
            EnvGuard::set("BUILDSCOPE_BACKOFF_UNIT_MS", "10"),
            EnvGuard::set("BUILDSCOPE_LOG_LEVEL", "DEBUG"),
            EnvGuard::set("BUILDSCOPE_COMMAND_TIMEOUT", "not-a-number"),
        ];

        let config = BuildscopeConfig::default();

        assert_eq!(config.registry_root, "registry.example.com/team");
        assert_eq!(config.check_attempts, 5);
        assert_eq!(config.check_timeout(), Duration::from_secs(45));
        assert_eq!(config.backoff_unit(), Duration::from_millis(10));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.command_timeout_secs, DEFAULT_COMMAND_TIMEOUT_SECS);
    }

    #[test]
    fn test_validation_valid() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validation_failures() {
        let cases: [fn(&mut BuildscopeConfig); 7] = [
            |c| c.registry_root = "  ".to_string(),
            |c| c.registry_root = "ghcr.io/groupsky/homy/".to_string(),
            |c| c.check_attempts = 0,
            |c| c.check_attempts = 11,
            |c| c.check_timeout_secs = 0,
            |c| c.command_timeout_secs = 601,
            |c| c.log_level = "verbose".to_string(),
        ];

        for mutate in cases {
            let mut config = valid_config();
            mutate(&mut config);
            assert!(config.validate().is_err(), "{:?}", config);
        }
    }

    #[test]
    fn test_config_display() {
        let display = valid_config().to_string();
        assert!(display.contains("Buildscope Configuration:"));
        assert!(display.contains("Registry Root: ghcr.io/groupsky/homy"));
        assert!(display.contains("Registry Checks: 3 attempts"));
    }
}
