//! Error types for the key store cache
//!
//! All fallible cache operations return [`CacheResult`]. The error taxonomy is
//! intentionally small:
//!
//! | Variant | Raised by | Cache state afterwards |
//! |---------|-----------|------------------------|
//! | `InvalidCapacity` | construction with a zero capacity | no cache exists |
//! | `InvalidConfiguration` | parsing TOML/JSON/env configuration | no cache exists |
//! | `Load` | a [`Loader`](crate::Loader) failing on a miss | unchanged |
//! | `Internal` | a violated structural invariant | reported, not repaired |
//!
//! Load failures are never remembered by the cache. The next caller that
//! misses on the same key drives the loader again.
//!
//! ## ErrorClassification
//!
//! [`CacheError`] implements [`ErrorClassification`] so callers can make
//! retry and alerting decisions without matching on variants:
//!
//! ```
//! use keystore_cache::{CacheError, ErrorClassification, ErrorSeverity};
//!
//! let err = CacheError::InvalidCapacity { capacity: 0 };
//! assert!(!err.is_retryable());
//! assert_eq!(err.severity(), ErrorSeverity::Error);
//! ```

use std::fmt;

use thiserror::Error;

/// Boxed error type carried by load failures
pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Standard result type using [`CacheError`]
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors produced by the cache engine
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache was configured with a capacity of zero
    #[error("Invalid cache capacity {capacity}: capacity must be greater than zero")]
    InvalidCapacity {
        /// The rejected capacity
        capacity: usize,
    },

    /// A configuration source could not be parsed or holds an invalid value
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration {
        /// What was wrong with the configuration
        message: String,
    },

    /// The loader failed to produce a value for a missing key
    #[error("Loader failed for key '{key}': {source}")]
    Load {
        /// `Debug` rendering of the key that missed
        key: String,
        /// The loader's own error
        #[source]
        source: BoxedError,
    },

    /// A structural invariant of the cache did not hold
    #[error("Internal cache error: {message}")]
    Internal {
        /// Description of the violated invariant
        message: String,
    },
}

impl CacheError {
    /// Create a configuration error
    pub fn invalid_configuration<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfiguration { message: message.into() }
    }

    /// Create a load error for `key`, boxing the loader's own error
    pub fn load<K, E>(key: &K, source: E) -> Self
    where
        K: fmt::Debug + ?Sized,
        E: Into<BoxedError>,
    {
        Self::Load { key: format!("{key:?}"), source: source.into() }
    }

    /// Create an internal (invariant violation) error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }

    /// Returns `true` when this error came from the loader
    #[must_use]
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::Load { .. })
    }

    /// Get the error type name for structured logging
    #[must_use]
    pub fn error_type_name(&self) -> &'static str {
        match self {
            Self::InvalidCapacity { .. } => "invalid_capacity",
            Self::InvalidConfiguration { .. } => "invalid_configuration",
            Self::Load { .. } => "load",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<toml::de::Error> for CacheError {
    fn from(err: toml::de::Error) -> Self {
        Self::invalid_configuration(format!("Invalid TOML format: {err}"))
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_configuration(format!("Invalid JSON format: {err}"))
    }
}

/// Error classification trait for consistent retry and alerting decisions
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// A failed load is retryable: the cache does not memoize failures, so a
    /// later call re-drives the loader.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;
}

impl ErrorClassification for CacheError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Load { .. })
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidCapacity { .. } | Self::InvalidConfiguration { .. } => {
                ErrorSeverity::Error
            }
            Self::Load { .. } => ErrorSeverity::Warning,
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }
}

/// Error severity levels for monitoring and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for error.
    use std::error::Error as _;
    use std::io;

    use super::*;

    /// Validates that a load error keeps the loader's error as its source.
    ///
    /// Assertions:
    /// - Ensures `err.is_load_error()` evaluates to true.
    /// - Confirms the source message equals `"backend down"`.
    /// - Confirms the display includes the debug-formatted key.
    #[test]
    fn load_error_preserves_source() {
        let err = CacheError::load("user:1", io::Error::new(io::ErrorKind::Other, "backend down"));

        assert!(err.is_load_error());
        assert_eq!(err.source().map(ToString::to_string), Some("backend down".to_string()));
        assert!(err.to_string().contains("\"user:1\""));
    }

    /// Validates the classification of every variant.
    ///
    /// Assertions:
    /// - Load errors are retryable warnings.
    /// - Configuration errors are non-retryable errors.
    /// - Internal errors are critical.
    #[test]
    fn classification_by_variant() {
        let load = CacheError::load(&1_u32, "timeout");
        assert!(load.is_retryable());
        assert_eq!(load.severity(), ErrorSeverity::Warning);
        assert!(!load.is_critical());

        let capacity = CacheError::InvalidCapacity { capacity: 0 };
        assert!(!capacity.is_retryable());
        assert_eq!(capacity.severity(), ErrorSeverity::Error);

        let config = CacheError::invalid_configuration("bad");
        assert!(!config.is_retryable());
        assert_eq!(config.error_type_name(), "invalid_configuration");

        let internal = CacheError::internal("index and order disagree");
        assert!(internal.is_critical());
        assert_eq!(internal.severity(), ErrorSeverity::Critical);
    }

    /// Validates that each variant's fields carry into its message.
    ///
    /// Assertions:
    /// - Confirms capacity, message and key fields are rendered.
    #[test]
    fn variant_fields_render_in_display() {
        let capacity = CacheError::InvalidCapacity { capacity: 0 };
        assert!(capacity.to_string().contains("capacity 0"));

        let config = CacheError::InvalidConfiguration { message: "capacity missing".to_string() };
        assert_eq!(config.to_string(), "Invalid configuration: capacity missing");

        let internal = CacheError::Internal { message: "dangling handle".to_string() };
        assert_eq!(internal.to_string(), "Internal cache error: dangling handle");

        let CacheError::Load { key, source } = CacheError::load(&7_u64, "gone") else {
            panic!("load constructor must build a Load variant");
        };
        assert_eq!(key, "7");
        assert_eq!(source.to_string(), "gone");
    }

    /// Validates `ErrorSeverity` ordering and display.
    ///
    /// Assertions:
    /// - Confirms `Info < Warning < Error < Critical`.
    /// - Confirms `ErrorSeverity::Warning` displays as `"WARN"`.
    #[test]
    fn severity_ordering_and_display() {
        assert!(ErrorSeverity::Info < ErrorSeverity::Warning);
        assert!(ErrorSeverity::Warning < ErrorSeverity::Error);
        assert!(ErrorSeverity::Error < ErrorSeverity::Critical);
        assert_eq!(ErrorSeverity::Warning.to_string(), "WARN");
    }
}
