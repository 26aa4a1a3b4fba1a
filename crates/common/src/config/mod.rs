//! Configuration collaborator
//!
//! Vaultline does not load or parse configuration files itself; it consumes
//! configuration through the narrow [`Configuration`] interface defined
//! here. Keys are dotted paths (`cypher.cyphers.default.algorithm`) and
//! every typed getter comes in two flavors: a non-defaulted form that fails
//! with [`ConfigError::Missing`] when the key is absent, and a `_or` form
//! that never fails.
//!
//! [`MapConfiguration`] is the in-memory implementation used by tests and
//! by embedders that assemble configuration from their own sources.

use std::collections::BTreeMap;
use std::time::Duration;

use thiserror::Error;

use crate::error::{ErrorClassification, ErrorSeverity};
use crate::secure::SecureString;

/// Configuration error type
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("missing configuration property '{0}'")]
    Missing(String),

    #[error("malformed configuration property '{key}': {message}")]
    Malformed { key: String, message: String },
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

impl ErrorClassification for ConfigError {
    fn is_retryable(&self) -> bool {
        false
    }

    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Error
    }
}

impl ConfigError {
    /// Create a malformed-property error for a specific key
    pub fn malformed(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed { key: key.into(), message: message.into() }
    }
}

/// Key-value configuration lookups keyed by dotted paths
///
/// Implementors only need [`Configuration::lookup`] and
/// [`Configuration::child_names`]; the typed getters are derived.
pub trait Configuration: Send + Sync {
    /// Look up the raw string value for a key, if present
    fn lookup(&self, key: &str) -> Option<String>;

    /// Enumerate the distinct child names directly under a key prefix
    ///
    /// For entries `a.b.x.p` and `a.b.y.q`, `child_names("a.b")` returns
    /// `["x", "y"]`. Used to discover named keystores and cyphers.
    fn child_names(&self, prefix: &str) -> Vec<String>;

    /// Get a string value, failing when the key is absent
    fn get_string(&self, key: &str) -> ConfigResult<String> {
        self.lookup(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    /// Get a string value or a default
    fn get_string_or(&self, key: &str, default: &str) -> String {
        self.lookup(key).unwrap_or_else(|| default.to_string())
    }

    /// Get an integer value, failing when absent or unparseable
    fn get_i64(&self, key: &str) -> ConfigResult<i64> {
        let raw = self.get_string(key)?;
        raw.trim()
            .parse::<i64>()
            .map_err(|e| ConfigError::malformed(key, format!("not an integer: {e}")))
    }

    /// Get an integer value or a default (malformed values also default)
    fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }

    /// Get a boolean value, failing when absent or unparseable
    fn get_bool(&self, key: &str) -> ConfigResult<bool> {
        let raw = self.get_string(key)?;
        match raw.trim() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            other => Err(ConfigError::malformed(key, format!("not a boolean: '{other}'"))),
        }
    }

    /// Get a boolean value or a default (malformed values also default)
    fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// Get a duration value, failing when absent or unparseable
    ///
    /// Accepts a bare integer (seconds) or an integer with an `ms`, `s`,
    /// `m`, or `h` suffix.
    fn get_duration(&self, key: &str) -> ConfigResult<Duration> {
        let raw = self.get_string(key)?;
        parse_duration(raw.trim())
            .ok_or_else(|| ConfigError::malformed(key, format!("not a duration: '{raw}'")))
    }

    /// Get a duration value or a default (malformed values also default)
    fn get_duration_or(&self, key: &str, default: Duration) -> Duration {
        self.get_duration(key).unwrap_or(default)
    }

    /// Get a secret value as a zeroizing string, failing when absent
    ///
    /// Use this for passwords and other credential material so the value
    /// is scrubbed from memory when dropped.
    fn get_secret(&self, key: &str) -> ConfigResult<SecureString> {
        self.get_string(key).map(SecureString::new)
    }
}

fn parse_duration(raw: &str) -> Option<Duration> {
    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let split_at = raw.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = raw.split_at(split_at);
    let value = digits.parse::<u64>().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => Some(Duration::from_secs(value * 60)),
        "h" => Some(Duration::from_secs(value * 3600)),
        _ => None,
    }
}

/// In-memory configuration backed by a sorted map
///
/// # Example
/// ```
/// use vaultline_common::config::{Configuration, MapConfiguration};
///
/// let config = MapConfiguration::builder()
///     .set("cypher.cyphers.default.algorithm", "aes-256-gcm")
///     .build();
/// assert_eq!(config.get_string("cypher.cyphers.default.algorithm").unwrap(), "aes-256-gcm");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapConfiguration {
    entries: BTreeMap<String, String>,
}

impl MapConfiguration {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration builder
    pub fn builder() -> MapConfigurationBuilder {
        MapConfigurationBuilder::default()
    }

    /// Insert or overwrite an entry
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }
}

impl Configuration for MapConfiguration {
    fn lookup(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn child_names(&self, prefix: &str) -> Vec<String> {
        let prefix = format!("{prefix}.");
        let mut names: Vec<String> = Vec::new();
        for key in self.entries.range(prefix.clone()..) {
            let (key, _) = key;
            let Some(rest) = key.strip_prefix(&prefix) else {
                break;
            };
            let name = rest.split('.').next().unwrap_or(rest);
            if names.last().map(String::as_str) != Some(name) {
                names.push(name.to_string());
            }
        }
        names
    }
}

/// Builder for [`MapConfiguration`] with a fluent API
#[derive(Debug, Default)]
pub struct MapConfigurationBuilder {
    config: MapConfiguration,
}

impl MapConfigurationBuilder {
    /// Set an entry
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(key, value);
        self
    }

    /// Build the configuration
    pub fn build(self) -> MapConfiguration {
        self.config
    }
}
