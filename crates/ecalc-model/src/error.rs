//! Error types for catalog records
//!
//! Provides error handling for:
//! - Snapshot decoding (JSON / YAML)
//! - Boundary validation of shortcode names
//! - Legacy textual condition rules

/// Errors while loading or validating a catalog snapshot
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Two rows of the same table share a shortcode name
    #[error("duplicate {table} name: '{name}'")]
    DuplicateName {
        /// Table the duplicate was found in
        table: &'static str,
        /// The repeated name
        name: String,
    },

    /// Name is empty or contains characters the shortcode grammar rejects
    #[error("invalid {table} name: '{name}'")]
    InvalidName {
        /// Table the row belongs to
        table: &'static str,
        /// The rejected name
        name: String,
    },

    /// JSON decoding failed
    #[error("invalid JSON catalog: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML decoding failed
    #[error("invalid YAML catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CatalogError {
    /// Create duplicate-name error
    pub fn duplicate(table: &'static str, name: impl Into<String>) -> Self {
        Self::DuplicateName {
            table,
            name: name.into(),
        }
    }

    /// Create invalid-name error
    pub fn invalid_name(table: &'static str, name: impl Into<String>) -> Self {
        Self::InvalidName {
            table,
            name: name.into(),
        }
    }
}

/// Errors parsing a textual condition rule such as `heating_type == oil`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionParseError {
    /// Rule text was empty
    #[error("empty condition rule")]
    Empty,

    /// No comparison operator found
    #[error("no comparison operator in rule: '{0}'")]
    MissingOperator(String),

    /// Left-hand side is not a field name
    #[error("invalid field reference in rule: '{0}'")]
    InvalidField(String),

    /// Right-hand side is missing
    #[error("missing comparison value in rule: '{0}'")]
    MissingValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_error_display() {
        let err = CatalogError::duplicate("formula", "savings");
        assert_eq!(err.to_string(), "duplicate formula name: 'savings'");

        let err = CatalogError::invalid_name("lookup", "bad name");
        assert_eq!(err.to_string(), "invalid lookup name: 'bad name'");
    }

    #[test]
    fn condition_error_display() {
        let err = ConditionParseError::MissingOperator("type oil".into());
        assert!(err.to_string().contains("no comparison operator"));
    }
}
