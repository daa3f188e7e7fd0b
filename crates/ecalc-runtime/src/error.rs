//! Error types for the runtime

use std::path::PathBuf;
use std::time::Duration;

use ecalc_model::CatalogError;
use ecalc_resolver::ResolveError;

/// Errors from a guarded execution
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// Resolution failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Deadline passed before resolution finished
    #[error("execution exceeded {}ms", limit.as_millis())]
    Timeout {
        /// Configured deadline
        limit: Duration,
    },

    /// Caller exceeded its rate limit
    #[error("rate limit exceeded for '{caller}', retry in {}ms", retry_after.as_millis())]
    RateLimited {
        /// Caller key
        caller: String,
        /// Time until the oldest call leaves the window
        retry_after: Duration,
    },

    /// Worker task panicked or was cancelled
    #[error("execution task failed: {0}")]
    Join(String),
}

impl ExecutionError {
    /// Stable machine-readable code
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resolve(err) => err.kind(),
            Self::Timeout { .. } => "timeout",
            Self::RateLimited { .. } => "rate_limited",
            Self::Join(_) => "internal",
        }
    }
}

/// Errors loading a catalog
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Extension is neither JSON nor YAML
    #[error("unsupported catalog format: {0} (expected .json, .yaml or .yml)")]
    UnsupportedFormat(PathBuf),

    /// Content failed to decode or validate
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// No catalog source configured
    #[error("no catalog configured")]
    NotConfigured,
}

/// Errors loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or type error
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Value out of range
    #[error("invalid value for {key}: {reason}")]
    Invalid {
        /// Dotted key
        key: &'static str,
        /// What is wrong
        reason: &'static str,
    },

    /// Subscriber could not be installed
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl ConfigError {
    /// Create invalid-value error
    #[must_use]
    pub fn invalid(key: &'static str, reason: &'static str) -> Self {
        Self::Invalid { key, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_kinds() {
        let err = ExecutionError::from(ResolveError::DivisionByZero);
        assert_eq!(err.kind(), "division_by_zero");
        assert_eq!(err.to_string(), "division by zero");

        let err = ExecutionError::Timeout {
            limit: Duration::from_secs(5),
        };
        assert_eq!(err.to_string(), "execution exceeded 5000ms");
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn rate_limit_display() {
        let err = ExecutionError::RateLimited {
            caller: "admin".into(),
            retry_after: Duration::from_millis(1200),
        };
        assert_eq!(err.to_string(), "rate limit exceeded for 'admin', retry in 1200ms");
    }
}
