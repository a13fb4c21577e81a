//! Cache configuration types and builder patterns
//!
//! This module provides configuration for the key store cache: its capacity,
//! how concurrent misses are coordinated, and whether access metrics are
//! collected. Configuration can be built in code, parsed from TOML or JSON,
//! or read from environment variables.
//!
//! ## Environment Variables
//! - `KEYSTORE_CACHE_NAME`: Name recorded on log events
//! - `KEYSTORE_CACHE_CAPACITY`: Maximum number of entries
//! - `KEYSTORE_CACHE_COORDINATION`: `exclusive` or `per_key`
//! - `KEYSTORE_CACHE_TRACK_METRICS`: Whether to count hits/misses (true/false)

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, CacheResult};

/// Default maximum number of cached entries
pub const DEFAULT_CAPACITY: usize = 100;

/// Default cache name used in log events
pub const DEFAULT_NAME: &str = "keystore";

const ENV_NAME: &str = "KEYSTORE_CACHE_NAME";
const ENV_CAPACITY: &str = "KEYSTORE_CACHE_CAPACITY";
const ENV_COORDINATION: &str = "KEYSTORE_CACHE_COORDINATION";
const ENV_TRACK_METRICS: &str = "KEYSTORE_CACHE_TRACK_METRICS";

/// Strategy used to suppress duplicate loads for concurrently missing keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadCoordination {
    /// Loads run inside the engine-wide exclusive section. Misses on
    /// different keys serialize behind one another.
    #[default]
    Exclusive,
    /// Loads run outside the structure lock, one leader per key. Callers
    /// missing on the same key wait for the leader; unrelated keys load in
    /// parallel.
    PerKey,
}

impl FromStr for LoadCoordination {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "exclusive" => Ok(Self::Exclusive),
            "per_key" | "per-key" | "perkey" => Ok(Self::PerKey),
            other => Err(CacheError::invalid_configuration(format!(
                "Unknown load coordination '{other}' (expected 'exclusive' or 'per_key')"
            ))),
        }
    }
}

/// Configuration for cache behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Name recorded on every log event emitted by the cache
    pub name: String,

    /// Maximum number of entries; must be greater than zero
    pub capacity: usize,

    /// How concurrent misses are coordinated
    pub coordination: LoadCoordination,

    /// Whether to collect access metrics
    pub track_metrics: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            capacity: DEFAULT_CAPACITY,
            coordination: LoadCoordination::Exclusive,
            track_metrics: false,
        }
    }
}

impl CacheConfig {
    /// Create a new configuration builder
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }

    /// Quick preset for an LRU cache of the given capacity
    ///
    /// # Example
    /// ```
    /// use keystore_cache::CacheConfig;
    ///
    /// let config = CacheConfig::lru(1000);
    /// assert_eq!(config.capacity, 1000);
    /// ```
    pub fn lru(capacity: usize) -> Self {
        Self { capacity, ..Self::default() }
    }

    /// Check that the configuration describes a usable cache
    ///
    /// # Errors
    /// Returns `CacheError::InvalidCapacity` when `capacity` is zero.
    pub fn validate(&self) -> CacheResult<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidCapacity { capacity: self.capacity });
        }
        Ok(())
    }

    /// Parse and validate a configuration from TOML
    ///
    /// Missing fields take their default values.
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` for malformed input and
    /// `CacheError::InvalidCapacity` for a zero capacity.
    pub fn from_toml_str(contents: &str) -> CacheResult<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a configuration from JSON
    ///
    /// # Errors
    /// Same as [`CacheConfig::from_toml_str`].
    pub fn from_json_str(contents: &str) -> CacheResult<Self> {
        let config: Self = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables
    ///
    /// Unset variables keep their default values.
    ///
    /// # Errors
    /// Returns `CacheError::InvalidConfiguration` if a variable is set to an
    /// unparseable value.
    pub fn from_env() -> CacheResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> CacheResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_NAME) {
            config.name = name;
        }
        if let Some(raw) = lookup(ENV_CAPACITY) {
            config.capacity = raw.trim().parse::<usize>().map_err(|e| {
                CacheError::invalid_configuration(format!("Invalid {ENV_CAPACITY} '{raw}': {e}"))
            })?;
        }
        if let Some(raw) = lookup(ENV_COORDINATION) {
            config.coordination = raw.parse()?;
        }
        if let Some(raw) = lookup(ENV_TRACK_METRICS) {
            config.track_metrics = parse_bool(&raw).ok_or_else(|| {
                CacheError::invalid_configuration(format!(
                    "Invalid {ENV_TRACK_METRICS} '{raw}' (expected true/false)"
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for CacheConfig with fluent API
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name recorded on log events
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.name = name.into();
        self
    }

    /// Set maximum number of entries
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity;
        self
    }

    /// Set the load coordination strategy
    pub fn coordination(mut self, coordination: LoadCoordination) -> Self {
        self.config.coordination = coordination;
        self
    }

    /// Enable or disable metrics tracking
    pub fn track_metrics(mut self, enabled: bool) -> Self {
        self.config.track_metrics = enabled;
        self
    }

    /// Build the configuration
    pub fn build(self) -> CacheConfig {
        self.config
    }
}
