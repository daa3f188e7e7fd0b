//! Error types for resolution
//!
//! Every failure carries the name it is about, so the admin "test formula"
//! view can point the operator at the offending record.

use ecalc_expr::{EvalError, SyntaxError};

/// Errors resolving a template
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    /// `[field:name]` not submitted and no fallback applies
    #[error("missing field: '{name}'")]
    MissingField {
        /// Field name
        name: String,
    },

    /// `[calc:name]` not in the catalog
    #[error("unknown formula: '{name}'")]
    UnknownFormula {
        /// Formula name
        name: String,
    },

    /// `[calc:name]` exists but is inactive
    #[error("formula '{name}' is inactive")]
    InactiveFormula {
        /// Formula name
        name: String,
    },

    /// `[lookup:name]` not in the catalog
    #[error("unknown lookup: '{name}'")]
    UnknownLookup {
        /// Lookup name
        name: String,
    },

    /// No condition matched and the lookup has no fallback
    #[error("no condition of lookup '{lookup}' matched")]
    LookupMiss {
        /// Lookup name
        lookup: String,
    },

    /// A formula or lookup reaches itself
    #[error("circular reference: {}", chain.join(" -> "))]
    CircularReference {
        /// References from the first repeated entry back to itself
        chain: Vec<String>,
    },

    /// Nesting deeper than the configured limit
    #[error("reference nesting exceeds {limit} levels")]
    DepthExceeded {
        /// Configured limit
        limit: usize,
    },

    /// Right operand of `/` was zero
    #[error("division by zero")]
    DivisionByZero,

    /// Template or formula text does not parse
    #[error("syntax error in {origin}: {error}")]
    Syntax {
        /// `template` or `[calc:name]`
        origin: String,
        /// Parser error
        #[source]
        error: SyntaxError,
    },

    /// Other evaluation failure
    #[error("evaluation failed: {0}")]
    Eval(EvalError),
}

impl ResolveError {
    /// Create syntax error for an origin
    pub fn syntax(origin: impl Into<String>, error: SyntaxError) -> Self {
        Self::Syntax {
            origin: origin.into(),
            error,
        }
    }

    /// Stable machine-readable code
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField { .. } => "missing_field",
            Self::UnknownFormula { .. } | Self::UnknownLookup { .. } => "unresolved_reference",
            Self::InactiveFormula { .. } => "inactive_formula",
            Self::LookupMiss { .. } => "lookup_miss",
            Self::CircularReference { .. } => "circular_reference",
            Self::DepthExceeded { .. } => "depth_exceeded",
            Self::DivisionByZero => "division_by_zero",
            Self::Syntax { .. } => "syntax_error",
            Self::Eval(_) => "evaluation_error",
        }
    }

    /// Check if error is a circular reference
    #[inline]
    #[must_use]
    pub fn is_circular(&self) -> bool {
        matches!(self, Self::CircularReference { .. })
    }

    /// Check if error names a record that could not be found
    #[inline]
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            Self::MissingField { .. }
                | Self::UnknownFormula { .. }
                | Self::InactiveFormula { .. }
                | Self::UnknownLookup { .. }
        )
    }
}

impl From<EvalError> for ResolveError {
    fn from(err: EvalError) -> Self {
        match err {
            EvalError::DivisionByZero => Self::DivisionByZero,
            other => Self::Eval(other),
        }
    }
}
