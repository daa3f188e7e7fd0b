//! Catalog of formulas, lookups and card fields
//!
//! The resolver reads records through the [`Catalog`] trait so that callers
//! decide where records come from. [`CatalogSnapshot`] is the decoded form
//! of a data-store fetch; [`MemoryCatalog`] indexes a validated snapshot by
//! shortcode name.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;
use crate::field::CardField;
use crate::formula::Formula;
use crate::lookup::FormulaLookup;
use crate::shortcode::is_valid_name;

/// Name-based access to catalog records
pub trait Catalog: Send + Sync {
    /// Formula by shortcode key (active or not)
    fn formula(&self, name: &str) -> Option<&Formula>;

    /// Lookup table by shortcode key
    fn lookup(&self, name: &str) -> Option<&FormulaLookup>;

    /// Card field declaration by field name
    fn card_field(&self, name: &str) -> Option<&CardField>;
}

/// Records fetched from the data store in one go
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    /// Stored formulas
    #[serde(default)]
    pub formulas: Vec<Formula>,

    /// Lookup tables
    #[serde(default, alias = "formula_lookups")]
    pub lookups: Vec<FormulaLookup>,

    /// Form inputs
    #[serde(default, alias = "fields")]
    pub card_fields: Vec<CardField>,
}

impl CatalogSnapshot {
    /// Create empty snapshot
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With formula
    #[inline]
    #[must_use]
    pub fn with_formula(mut self, formula: Formula) -> Self {
        self.formulas.push(formula);
        self
    }

    /// With lookup table
    #[inline]
    #[must_use]
    pub fn with_lookup(mut self, lookup: FormulaLookup) -> Self {
        self.lookups.push(lookup);
        self
    }

    /// With card field
    #[inline]
    #[must_use]
    pub fn with_field(mut self, field: CardField) -> Self {
        self.card_fields.push(field);
        self
    }

    /// Decode from JSON
    ///
    /// # Errors
    /// Returns error if the document does not match the record shapes
    pub fn from_json_str(input: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Decode from YAML
    ///
    /// # Errors
    /// Returns error if the document does not match the record shapes
    pub fn from_yaml_str(input: &str) -> Result<Self, CatalogError> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// Check names are well-formed and unique per table
    ///
    /// # Errors
    /// Returns the first invalid or duplicate name found
    pub fn validate(&self) -> Result<(), CatalogError> {
        check_names("formula", self.formulas.iter().map(|f| f.name.as_str()))?;
        check_names("lookup", self.lookups.iter().map(|l| l.name.as_str()))?;
        check_names("field", self.card_fields.iter().map(|f| f.field_name.as_str()))?;
        Ok(())
    }
}

fn check_names<'a>(table: &'static str, names: impl Iterator<Item = &'a str>) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for name in names {
        if !is_valid_name(name) {
            return Err(CatalogError::invalid_name(table, name));
        }
        if !seen.insert(name) {
            return Err(CatalogError::duplicate(table, name));
        }
    }
    Ok(())
}

/// In-memory catalog indexed by name
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    formulas: IndexMap<String, Formula>,
    lookups: IndexMap<String, FormulaLookup>,
    card_fields: IndexMap<String, CardField>,
}

impl MemoryCatalog {
    /// Create empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a snapshot after validating it
    ///
    /// # Errors
    /// Returns error if the snapshot has invalid or duplicate names
    pub fn from_snapshot(snapshot: CatalogSnapshot) -> Result<Self, CatalogError> {
        snapshot.validate()?;
        Ok(Self {
            formulas: snapshot.formulas.into_iter().map(|f| (f.name.clone(), f)).collect(),
            lookups: snapshot.lookups.into_iter().map(|l| (l.name.clone(), l)).collect(),
            card_fields: snapshot
                .card_fields
                .into_iter()
                .map(|f| (f.field_name.clone(), f))
                .collect(),
        })
    }

    /// All formulas in stored order
    pub fn formulas(&self) -> impl Iterator<Item = &Formula> {
        self.formulas.values()
    }

    /// All lookups in stored order
    pub fn lookups(&self) -> impl Iterator<Item = &FormulaLookup> {
        self.lookups.values()
    }

    /// All card fields in stored order
    pub fn card_fields(&self) -> impl Iterator<Item = &CardField> {
        self.card_fields.values()
    }

    /// Insert or replace a formula (last write wins)
    pub fn upsert_formula(&mut self, formula: Formula) {
        self.formulas.insert(formula.name.clone(), formula);
    }

    /// Insert or replace a lookup (last write wins)
    pub fn upsert_lookup(&mut self, lookup: FormulaLookup) {
        self.lookups.insert(lookup.name.clone(), lookup);
    }
}

impl Catalog for MemoryCatalog {
    fn formula(&self, name: &str) -> Option<&Formula> {
        self.formulas.get(name)
    }

    fn lookup(&self, name: &str) -> Option<&FormulaLookup> {
        self.lookups.get(name)
    }

    fn card_field(&self, name: &str) -> Option<&CardField> {
        self.card_fields.get(name)
    }
}
