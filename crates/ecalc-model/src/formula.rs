//! Stored formulas
//!
//! A formula is a named expression referenced by `[calc:name]`. Its text may
//! contain further shortcodes, so formulas compose by name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Category of a formula, used by the admin UI for grouping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormulaType {
    /// General calculation
    #[default]
    Calculation,
    /// Savings estimate (currency or energy)
    Savings,
    /// Cost figure
    Cost,
    /// CO2 emission figure
    Emissions,
    /// Anything else; unknown stored categories land here
    #[serde(other)]
    Custom,
}

/// A named stored expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    /// Row identifier
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Unique shortcode key
    pub name: String,

    /// Free-form description for operators
    #[serde(default)]
    pub description: Option<String>,

    /// Expression text, may contain shortcodes
    pub formula_text: String,

    /// Category
    #[serde(default)]
    pub formula_type: FormulaType,

    /// Display unit of the result (`€`, `kWh`, ...)
    #[serde(default)]
    pub unit: Option<String>,

    /// Inactive formulas are excluded from resolution
    #[serde(default = "default_active")]
    pub is_active: bool,

    /// Edit counter
    #[serde(default = "default_version")]
    pub version: u32,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

fn default_version() -> u32 {
    1
}

impl Formula {
    /// Create an active formula
    #[must_use]
    pub fn new(name: impl Into<String>, formula_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            formula_text: formula_text.into(),
            formula_type: FormulaType::default(),
            unit: None,
            is_active: true,
            version: 1,
            created_at: Utc::now(),
        }
    }

    /// With display unit
    #[inline]
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// With category
    #[inline]
    #[must_use]
    pub fn with_type(mut self, formula_type: FormulaType) -> Self {
        self.formula_type = formula_type;
        self
    }

    /// With description
    #[inline]
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark inactive
    #[inline]
    #[must_use]
    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}
