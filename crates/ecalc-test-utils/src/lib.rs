//! Testing utilities for ecalc workspace
//!
//! Shared fixtures: an energy-savings catalog modelled on the calculator's
//! production data, a cyclic catalog, and a typical form submission.

#![allow(missing_docs)]

use ecalc_model::{
    CardField, CatalogSnapshot, ConditionRule, FieldType, FieldValues, Formula, FormulaLookup, FormulaType,
    MemoryCatalog,
};

pub fn energy_snapshot() -> CatalogSnapshot {
    CatalogSnapshot::new()
        .with_field(CardField::new("current_consumption", FieldType::Number).required())
        .with_field(CardField::new("new_consumption", FieldType::Number))
        .with_field(CardField::new("energy_price", FieldType::Number).with_default(0.12))
        .with_field(CardField::new("heating_type", FieldType::Select))
        .with_field(CardField::new("area", FieldType::Slider))
        .with_formula(
            Formula::new(
                "annual_savings",
                "([field:current_consumption] - [field:new_consumption]) * [field:energy_price]",
            )
            .with_type(FormulaType::Savings)
            .with_unit("€"),
        )
        .with_formula(Formula::new("oil-rate", "0.11").with_unit("€/kWh"))
        .with_formula(Formula::new("gas-rate", "0.09").with_unit("€/kWh"))
        .with_formula(
            Formula::new("heating_cost", "[field:current_consumption] * [lookup:heating_rate]")
                .with_type(FormulaType::Cost)
                .with_unit("€"),
        )
        .with_formula(Formula::new("payback_years", "round(15000 / [calc:annual_savings], 1)"))
        .with_formula(
            Formula::new(
                "co2_reduction",
                "round(([field:current_consumption] - [field:new_consumption]) * 0.266 / 1000, 2)",
            )
            .with_type(FormulaType::Emissions)
            .with_unit("t"),
        )
        .with_formula(Formula::new("legacy_rate", "0.2").inactive())
        .with_lookup(
            FormulaLookup::new("heating_rate")
                .when(ConditionRule::equals("heating_type", "oil"), "[calc:oil-rate]")
                .when(ConditionRule::equals("heating_type", "gas"), "[calc:gas-rate]"),
        )
}

pub fn energy_catalog() -> MemoryCatalog {
    MemoryCatalog::from_snapshot(energy_snapshot()).unwrap()
}

/// `a -> b -> a`, plus `self_ref -> self_ref`
pub fn cyclic_catalog() -> MemoryCatalog {
    let snapshot = CatalogSnapshot::new()
        .with_formula(Formula::new("a", "[calc:b] + 1"))
        .with_formula(Formula::new("b", "[calc:a] * 2"))
        .with_formula(Formula::new("self_ref", "[calc:self_ref]"))
        .with_formula(Formula::new("via_lookup", "[lookup:loop]"))
        .with_lookup(FormulaLookup::new("loop").when(ConditionRule::Always, "[calc:via_lookup]"));
    MemoryCatalog::from_snapshot(snapshot).unwrap()
}

/// Submission from the end-to-end scenario: 20000 kWh down to 8000 kWh at 0.12 €/kWh
pub fn sample_submission() -> FieldValues {
    FieldValues::new()
        .with("current_consumption", 20000)
        .with("new_consumption", 8000)
        .with("energy_price", 0.12)
        .with("heating_type", "oil")
}

pub fn energy_snapshot_json() -> String {
    serde_json::to_string_pretty(&energy_snapshot()).unwrap()
}
