//! Runtime configuration for the parallel execution context.
//!
//! Configuration is assembled from defaults, environment variables, and
//! (with the `config-file` feature) TOML documents:
//!
//! ```
//! use ioeffect::RuntimeConfig;
//!
//! let config = RuntimeConfig::default()
//!     .worker_name_prefix("fetch")
//!     .max_in_flight(8);
//!
//! assert_eq!(config.max_in_flight_limit(), Some(8));
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding the worker thread name prefix.
pub const ENV_WORKER_PREFIX: &str = "IOEFFECT_WORKER_PREFIX";
/// Environment variable overriding the worker stack size in bytes.
pub const ENV_WORKER_STACK_SIZE: &str = "IOEFFECT_WORKER_STACK_SIZE";
/// Environment variable bounding the number of in-flight workers.
pub const ENV_MAX_IN_FLIGHT: &str = "IOEFFECT_MAX_IN_FLIGHT";
/// Environment variable enabling or disabling the parallel capability.
pub const ENV_PARALLEL: &str = "IOEFFECT_PARALLEL";

const DEFAULT_WORKER_PREFIX: &str = "ioeffect-worker";
const MIN_STACK_SIZE: usize = 16 * 1024;

/// Errors produced while loading configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// The variable or field name.
        key: String,
        /// The rejected raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
    /// A TOML document could not be parsed.
    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Settings for worker spawning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Prefix for worker thread names; workers are named `{prefix}-{n}`.
    pub worker_name_prefix: String,
    /// Stack size for worker threads. `None` uses the platform default.
    pub worker_stack_size: Option<usize>,
    /// Maximum number of top-level workers running at once. Submission
    /// blocks while the limit is reached; work submitted from a worker of the
    /// same context is not counted. `None` means unbounded.
    pub max_in_flight: Option<usize>,
    /// Whether the parallel capability may be used at all.
    pub parallel: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_name_prefix: DEFAULT_WORKER_PREFIX.to_string(),
            worker_stack_size: None,
            max_in_flight: None,
            parallel: true,
        }
    }
}

impl RuntimeConfig {
    /// Sets the worker thread name prefix.
    #[must_use]
    pub fn worker_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.worker_name_prefix = prefix.into();
        self
    }

    /// Sets the worker stack size in bytes.
    #[must_use]
    pub fn worker_stack_size(mut self, bytes: usize) -> Self {
        self.worker_stack_size = Some(bytes);
        self
    }

    /// Bounds the number of concurrently running workers.
    #[must_use]
    pub fn max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit);
        self
    }

    /// Enables or disables the parallel capability.
    #[must_use]
    pub fn parallel(mut self, enabled: bool) -> Self {
        self.parallel = enabled;
        self
    }

    /// Returns the configured in-flight limit.
    #[must_use]
    pub fn max_in_flight_limit(&self) -> Option<usize> {
        self.max_in_flight
    }

    /// Loads defaults overridden by `IOEFFECT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads defaults overridden by values from `lookup`.
    ///
    /// This is the testable core of [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(prefix) = lookup(ENV_WORKER_PREFIX) {
            config.worker_name_prefix = prefix;
        }
        if let Some(raw) = lookup(ENV_WORKER_STACK_SIZE) {
            config.worker_stack_size = Some(parse_usize(ENV_WORKER_STACK_SIZE, &raw)?);
        }
        if let Some(raw) = lookup(ENV_MAX_IN_FLIGHT) {
            config.max_in_flight = Some(parse_usize(ENV_MAX_IN_FLIGHT, &raw)?);
        }
        if let Some(raw) = lookup(ENV_PARALLEL) {
            config.parallel = parse_bool(ENV_PARALLEL, &raw)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses a TOML document.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_name_prefix.is_empty() {
            return Err(invalid("worker_name_prefix", "", "must not be empty"));
        }
        if let Some(size) = self.worker_stack_size {
            if size < MIN_STACK_SIZE {
                return Err(invalid(
                    "worker_stack_size",
                    &size.to_string(),
                    &format!("must be at least {MIN_STACK_SIZE} bytes"),
                ));
            }
        }
        if self.max_in_flight == Some(0) {
            return Err(invalid("max_in_flight", "0", "must be greater than zero"));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_usize(key: &str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|e: std::num::ParseIntError| invalid(key, raw, &e.to_string()))
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, raw, "expected a boolean")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = RuntimeConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.parallel);
        assert_eq!(config.worker_name_prefix, "ioeffect-worker");
    }

    #[test]
    fn env_overrides_apply() {
        let config = RuntimeConfig::from_lookup(lookup(&[
            (ENV_WORKER_PREFIX, "io"),
            (ENV_WORKER_STACK_SIZE, "65536"),
            (ENV_MAX_IN_FLIGHT, "4"),
            (ENV_PARALLEL, "off"),
        ]))
        .unwrap();

        assert_eq!(config.worker_name_prefix, "io");
        assert_eq!(config.worker_stack_size, Some(65536));
        assert_eq!(config.max_in_flight, Some(4));
        assert!(!config.parallel);
    }

    #[test]
    fn env_rejects_garbage() {
        let err = RuntimeConfig::from_lookup(lookup(&[(ENV_MAX_IN_FLIGHT, "many")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == ENV_MAX_IN_FLIGHT));

        let err = RuntimeConfig::from_lookup(lookup(&[(ENV_PARALLEL, "maybe")])).unwrap_err();
        assert!(err.to_string().contains("expected a boolean"));
    }

    #[test]
    fn validate_rejects_zero_limit_and_tiny_stack() {
        assert!(RuntimeConfig::default().max_in_flight(0).validate().is_err());
        assert!(RuntimeConfig::default().worker_stack_size(1024).validate().is_err());
        assert!(RuntimeConfig::default().worker_name_prefix("").validate().is_err());
    }

    #[cfg(feature = "config-file")]
    #[test]
    fn toml_round_trips_fields() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            worker_name_prefix = "net"
            max_in_flight = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.worker_name_prefix, "net");
        assert_eq!(config.max_in_flight, Some(2));
        assert!(config.parallel);

        assert!(matches!(
            RuntimeConfig::from_toml_str("unknown = 1"),
            Err(ConfigError::Parse(_))
        ));
    }
}
