//! Resolver configuration

use serde::{Deserialize, Serialize};

/// What to do when a `[field:name]` was not submitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingFieldPolicy {
    /// Fail with `MissingField`
    #[default]
    Error,
    /// Use the declared card field's fallback (`0` for numeric types, `""`
    /// for text types, or its explicit default); undeclared and required
    /// fields still fail
    TypeDefault,
}

/// Resolver settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum nesting of `calc` / `lookup` references
    pub max_depth: usize,
    /// Missing-field policy
    pub missing_field_policy: MissingFieldPolicy,
    /// Decimals used when rendering numbers into text templates
    pub render_precision: usize,
}

impl ResolverConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With nesting limit
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// With missing-field policy
    #[inline]
    #[must_use]
    pub fn with_missing_field_policy(mut self, policy: MissingFieldPolicy) -> Self {
        self.missing_field_policy = policy;
        self
    }

    /// With render precision
    #[inline]
    #[must_use]
    pub fn with_render_precision(mut self, precision: usize) -> Self {
        self.render_precision = precision;
        self
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            missing_field_policy: MissingFieldPolicy::Error,
            render_precision: 2,
        }
    }
}
