//! Engine configuration
//!
//! Loaded from TOML; every section and field has a default, so an empty
//! file is a valid configuration.
//!
//! ```toml
//! [resolver]
//! max_depth = 32
//! missing_field_policy = "error"
//!
//! [execution]
//! timeout_ms = 5000
//! rate_limit_per_minute = 30
//!
//! [catalog]
//! path = "catalog.json"
//! cache_ttl_secs = 1800
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use ecalc_resolver::ResolverConfig;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Resolver settings
    pub resolver: ResolverConfig,
    /// Execution guards
    pub execution: ExecutionConfig,
    /// Catalog source
    pub catalog: CatalogConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse TOML text
    ///
    /// # Errors
    /// Returns parse errors or [`ConfigError::Invalid`] for out-of-range values
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    ///
    /// # Errors
    /// Returns I/O, parse or validation errors
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the offending key
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolver.max_depth == 0 {
            return Err(ConfigError::invalid("resolver.max_depth", "must be at least 1"));
        }
        if self.execution.timeout_ms == 0 {
            return Err(ConfigError::invalid("execution.timeout_ms", "must be at least 1"));
        }
        if self.execution.rate_limit_per_minute == 0 {
            return Err(ConfigError::invalid(
                "execution.rate_limit_per_minute",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// With resolver settings
    #[inline]
    #[must_use]
    pub fn with_resolver(mut self, resolver: ResolverConfig) -> Self {
        self.resolver = resolver;
        self
    }

    /// With execution timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.execution.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// With rate limit
    #[inline]
    #[must_use]
    pub fn with_rate_limit(mut self, per_minute: u32) -> Self {
        self.execution.rate_limit_per_minute = per_minute;
        self
    }

    /// With catalog file
    #[inline]
    #[must_use]
    pub fn with_catalog_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.catalog.path = Some(path.into());
        self
    }

    /// With log level directive
    #[inline]
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging.level = level.into();
        self
    }
}

/// Execution guards around a resolver call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Deadline per call in milliseconds
    pub timeout_ms: u64,
    /// Calls allowed per caller in any sixty-second window
    pub rate_limit_per_minute: u32,
}

impl ExecutionConfig {
    /// Deadline as a duration
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            rate_limit_per_minute: 30,
        }
    }
}

/// Where the catalog comes from and how long it is cached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// JSON or YAML catalog file
    pub path: Option<PathBuf>,
    /// Snapshot cache lifetime in seconds
    pub cache_ttl_secs: u64,
}

impl CatalogConfig {
    /// Cache lifetime as a duration
    #[inline]
    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: None,
            cache_ttl_secs: 1_800,
        }
    }
}

/// Log output settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
