//! Shortcode resolver
//!
//! A [`Resolver`] borrows a [`Catalog`] and resolves templates against one
//! submission at a time. Each call opens a private session that tracks the
//! chain of `calc`/`lookup` references being expanded (cycle and depth
//! guard) and memoises finished references, so a formula used twice in one
//! template is evaluated once.

use std::collections::{BTreeSet, HashMap};

use ecalc_expr::{parse, scan, Environment};
use ecalc_model::{
    Catalog, FieldValues, LookupDefault, LookupTarget, ShortcodeKind, ShortcodeRef, Value,
};

use crate::config::{MissingFieldPolicy, ResolverConfig};
use crate::error::ResolveError;
use crate::template::{classify, TemplateKind};

/// Result alias for resolution
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Resolves templates against a catalog
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    catalog: &'a dyn Catalog,
    config: ResolverConfig,
}

impl std::fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<'a> Resolver<'a> {
    /// Create resolver with default configuration
    #[must_use]
    pub fn new(catalog: &'a dyn Catalog) -> Self {
        Self {
            catalog,
            config: ResolverConfig::default(),
        }
    }

    /// With configuration
    #[inline]
    #[must_use]
    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    /// Get configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve a template to a value
    ///
    /// Arithmetic templates are evaluated; text templates have their
    /// shortcodes substituted and come back as [`Value::Text`].
    ///
    /// # Errors
    /// Returns the first resolution failure encountered
    pub fn resolve(&self, template: &str, fields: &FieldValues) -> Result<Value> {
        Session::new(self, fields).template("template", template)
    }

    /// Resolve the stored formula `name`, exactly as `[calc:name]` would
    ///
    /// Formula text must parse as arithmetic; it is never rendered as text.
    ///
    /// # Errors
    /// Returns `UnknownFormula`/`InactiveFormula` or any nested failure
    pub fn resolve_formula(&self, name: &str, fields: &FieldValues) -> Result<Value> {
        Session::new(self, fields).reference(&ShortcodeRef::calc(name))
    }

    /// Resolve a template and format the result for display
    ///
    /// Numbers use at most `render_precision` decimals.
    ///
    /// # Errors
    /// Same as [`Resolver::resolve`]
    pub fn render(&self, template: &str, fields: &FieldValues) -> Result<String> {
        self.resolve(template, fields)
            .map(|value| value.to_display_string(self.config.render_precision))
    }

    /// Transitive set of shortcodes the formula `name` depends on
    ///
    /// Lookup conditions contribute the fields they compare. References to
    /// records that do not exist are listed but not followed.
    ///
    /// # Errors
    /// Returns `UnknownFormula` for the root and `CircularReference` if any
    /// path loops back on itself
    pub fn dependencies(&self, name: &str) -> Result<BTreeSet<ShortcodeRef>> {
        if self.catalog.formula(name).is_none() {
            return Err(ResolveError::UnknownFormula {
                name: name.to_string(),
            });
        }

        let mut out = BTreeSet::new();
        let mut stack = Vec::new();
        let mut done = BTreeSet::new();
        self.collect_dependencies(&ShortcodeRef::calc(name), &mut stack, &mut done, &mut out)?;
        Ok(out)
    }

    fn collect_dependencies(
        &self,
        reference: &ShortcodeRef,
        stack: &mut Vec<ShortcodeRef>,
        done: &mut BTreeSet<ShortcodeRef>,
        out: &mut BTreeSet<ShortcodeRef>,
    ) -> Result<()> {
        if let Some(pos) = stack.iter().position(|r| r == reference) {
            return Err(cycle(&stack[pos..], reference));
        }
        if done.contains(reference) {
            return Ok(());
        }

        let children = self.direct_references(reference);
        stack.push(reference.clone());
        for child in children {
            out.insert(child.clone());
            if child.kind != ShortcodeKind::Field {
                self.collect_dependencies(&child, stack, done, out)?;
            }
        }
        stack.pop();
        done.insert(reference.clone());
        Ok(())
    }

    /// References one step away from `reference` in the catalog
    pub(crate) fn direct_references(&self, reference: &ShortcodeRef) -> Vec<ShortcodeRef> {
        match reference.kind {
            ShortcodeKind::Field => Vec::new(),
            ShortcodeKind::Calc => self
                .catalog
                .formula(&reference.name)
                .map(|f| ecalc_expr::references(&f.formula_text))
                .unwrap_or_default(),
            ShortcodeKind::Lookup => {
                let Some(lookup) = self.catalog.lookup(&reference.name) else {
                    return Vec::new();
                };
                let mut refs = Vec::new();
                for condition in &lookup.conditions {
                    refs.extend(condition.rule.fields().into_iter().map(ShortcodeRef::field));
                    refs.extend(target_references(&condition.target));
                }
                if let LookupDefault::Fallback { target } = &lookup.default_action {
                    refs.extend(target_references(target));
                }
                refs
            }
        }
    }
}

fn target_references(target: &LookupTarget) -> Vec<ShortcodeRef> {
    match target {
        LookupTarget::Template(text) => ecalc_expr::references(text),
        LookupTarget::Literal { .. } => Vec::new(),
    }
}

fn cycle(path: &[ShortcodeRef], again: &ShortcodeRef) -> ResolveError {
    let mut chain: Vec<String> = path.iter().map(ToString::to_string).collect();
    chain.push(again.to_string());
    ResolveError::CircularReference { chain }
}

/// One resolution call
struct Session<'r, 'a> {
    resolver: &'r Resolver<'a>,
    fields: &'r FieldValues,
    stack: Vec<ShortcodeRef>,
    memo: HashMap<ShortcodeRef, Value>,
}

impl<'r, 'a> Session<'r, 'a> {
    fn new(resolver: &'r Resolver<'a>, fields: &'r FieldValues) -> Self {
        Self {
            resolver,
            fields,
            stack: Vec::new(),
            memo: HashMap::new(),
        }
    }

    fn template(&mut self, origin: &str, text: &str) -> Result<Value> {
        let kind = classify(text).map_err(|e| ResolveError::syntax(origin, e))?;
        match kind {
            TemplateKind::Arithmetic => self.arithmetic(origin, text),
            TemplateKind::Text => self.substitute(origin, text),
        }
    }

    /// Parse and evaluate, with no fallback to text
    fn arithmetic(&mut self, origin: &str, text: &str) -> Result<Value> {
        let expr = parse(text).map_err(|e| ResolveError::syntax(origin, e))?;
        expr.evaluate(self)
    }

    fn substitute(&mut self, origin: &str, text: &str) -> Result<Value> {
        let precision = self.resolver.config.render_precision;
        let mut out = String::with_capacity(text.len());
        let mut pos = 0;
        for found in scan(text) {
            let found = found.map_err(|e| ResolveError::syntax(origin, e))?;
            out.push_str(&text[pos..found.start]);
            let value = self.reference(&found.reference)?;
            out.push_str(&value.to_display_string(precision));
            pos = found.end;
        }
        out.push_str(&text[pos..]);
        Ok(Value::Text(out))
    }

    fn reference(&mut self, reference: &ShortcodeRef) -> Result<Value> {
        if reference.kind == ShortcodeKind::Field {
            return self.field(&reference.name);
        }
        if let Some(value) = self.memo.get(reference) {
            return Ok(value.clone());
        }

        if let Some(pos) = self.stack.iter().position(|r| r == reference) {
            let err = cycle(&self.stack[pos..], reference);
            tracing::warn!("Rejected reference: {}", err);
            return Err(err);
        }
        let limit = self.resolver.config.max_depth;
        if self.stack.len() >= limit {
            return Err(ResolveError::DepthExceeded { limit });
        }

        tracing::debug!("Resolving {} at depth {}", reference, self.stack.len());
        self.stack.push(reference.clone());
        let value = match reference.kind {
            ShortcodeKind::Calc => self.calc(&reference.name),
            _ => self.lookup(&reference.name),
        };
        self.stack.pop();

        let value = value?;
        self.memo.insert(reference.clone(), value.clone());
        Ok(value)
    }

    fn field(&self, name: &str) -> Result<Value> {
        if let Some(value) = self.fields.get(name) {
            return Ok(value.clone());
        }
        let fallback = match self.resolver.config.missing_field_policy {
            MissingFieldPolicy::Error => None,
            MissingFieldPolicy::TypeDefault => self
                .resolver
                .catalog
                .card_field(name)
                .and_then(ecalc_model::CardField::fallback_value),
        };
        fallback.ok_or_else(|| ResolveError::MissingField {
            name: name.to_string(),
        })
    }

    fn calc(&mut self, name: &str) -> Result<Value> {
        let catalog = self.resolver.catalog;
        let formula = catalog
            .formula(name)
            .ok_or_else(|| ResolveError::UnknownFormula {
                name: name.to_string(),
            })?;
        if !formula.is_active {
            return Err(ResolveError::InactiveFormula {
                name: name.to_string(),
            });
        }
        // Stored formulas are always arithmetic, so a typo fails loudly
        let origin = ShortcodeRef::calc(name).to_string();
        self.arithmetic(&origin, &formula.formula_text)
    }

    fn lookup(&mut self, name: &str) -> Result<Value> {
        let catalog = self.resolver.catalog;
        let lookup = catalog
            .lookup(name)
            .ok_or_else(|| ResolveError::UnknownLookup {
                name: name.to_string(),
            })?;

        let accessor = |field: &str| self.field(field).ok();
        let matched = lookup
            .conditions
            .iter()
            .position(|c| c.rule.matches(&accessor));

        let target = match (matched, &lookup.default_action) {
            (Some(index), _) => {
                tracing::debug!("Lookup {} matched condition {}", name, index);
                &lookup.conditions[index].target
            }
            (None, LookupDefault::Fallback { target }) => {
                tracing::debug!("Lookup {} fell back to default", name);
                target
            }
            (None, LookupDefault::Error) => {
                return Err(ResolveError::LookupMiss {
                    lookup: name.to_string(),
                })
            }
        };

        match target {
            LookupTarget::Literal { value } => Ok(value.clone()),
            LookupTarget::Template(text) => {
                let origin = ShortcodeRef::lookup(name).to_string();
                self.template(&origin, text)
            }
        }
    }
}

impl Environment for Session<'_, '_> {
    type Error = ResolveError;

    fn resolve(&mut self, reference: &ShortcodeRef) -> Result<Value> {
        self.reference(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecalc_model::{
        CardField, CatalogSnapshot, ComparisonOp, ConditionRule, FieldType, Formula,
        FormulaLookup, MemoryCatalog,
    };
    use ecalc_test_utils::{cyclic_catalog, energy_catalog, sample_submission};
    use pretty_assertions::assert_eq;

    fn catalog(snapshot: CatalogSnapshot) -> MemoryCatalog {
        MemoryCatalog::from_snapshot(snapshot).unwrap()
    }

    #[test]
    fn plain_arithmetic() {
        let empty = MemoryCatalog::new();
        let resolver = Resolver::new(&empty);
        assert_eq!(
            resolver.resolve("2 + 3 * 4", &FieldValues::new()),
            Ok(Value::Number(14.0))
        );
    }

    #[test]
    fn field_substitution() {
        let empty = MemoryCatalog::new();
        let resolver = Resolver::new(&empty);
        let fields = FieldValues::new().with("a", 2).with("b", 3);
        assert_eq!(
            resolver.resolve("[field:a] + [field:b]", &fields),
            Ok(Value::Number(5.0))
        );
    }

    #[test]
    fn end_to_end_savings() {
        let catalog = energy_catalog();
        let resolver = Resolver::new(&catalog);
        let value = resolver
            .resolve_formula("annual_savings", &sample_submission())
            .unwrap();
        assert!((value.as_number().unwrap() - 1440.0).abs() < 1e-9);
    }

    #[test]
    fn nested_calc_and_lookup() {
        let catalog = energy_catalog();
        let resolver = Resolver::new(&catalog);
        let fields = sample_submission();

        let cost = resolver.resolve_formula("heating_cost", &fields).unwrap();
        assert!((cost.as_number().unwrap() - 2200.0).abs() < 1e-9);

        let payback = resolver.resolve_formula("payback_years", &fields).unwrap();
        assert_eq!(payback, Value::Number(10.4));

        let gas = sample_submission().with("heating_type", "gas");
        let cost = resolver.resolve_formula("heating_cost", &gas).unwrap();
        assert!((cost.as_number().unwrap() - 1800.0).abs() < 1e-9);
    }

    #[test]
    fn lookup_miss_is_an_error() {
        let catalog = energy_catalog();
        let resolver = Resolver::new(&catalog);
        let fields = sample_submission().with("heating_type", "electric");
        assert_eq!(
            resolver.resolve("[lookup:heating_rate]", &fields),
            Err(ResolveError::LookupMiss {
                lookup: "heating_rate".into()
            })
        );
    }

    #[test]
    fn lookup_fallback_and_literal_targets() {
        let catalog = catalog(
            CatalogSnapshot::new().with_lookup(
                FormulaLookup::new("band")
                    .when(
                        ConditionRule::compare("area", ComparisonOp::Ge, 200),
                        Value::from("large"),
                    )
                    .when(ConditionRule::compare("area", ComparisonOp::Ge, 100), "2 * 3")
                    .otherwise(Value::from("small")),
            ),
        );
        let resolver = Resolver::new(&catalog);
        let band = |area: i32| {
            resolver
                .resolve("[lookup:band]", &FieldValues::new().with("area", area))
                .unwrap()
        };
        assert_eq!(band(250), Value::from("large"));
        assert_eq!(band(150), Value::Number(6.0));
        assert_eq!(band(50), Value::from("small"));
        // A missing compared field does not match, so the fallback applies
        assert_eq!(
            resolver.resolve("[lookup:band]", &FieldValues::new()),
            Ok(Value::from("small"))
        );
    }

    #[test]
    fn first_matching_condition_wins() {
        let catalog = catalog(
            CatalogSnapshot::new().with_lookup(
                FormulaLookup::new("order")
                    .when(ConditionRule::Always, "1")
                    .when(ConditionRule::Always, "2"),
            ),
        );
        let resolver = Resolver::new(&catalog);
        assert_eq!(
            resolver.resolve("[lookup:order]", &FieldValues::new()),
            Ok(Value::Number(1.0))
        );
    }

    #[test]
    fn circular_references_are_detected() {
        let catalog = cyclic_catalog();
        let resolver = Resolver::new(&catalog);
        let fields = FieldValues::new();

        let err = resolver.resolve("[calc:a] + 1", &fields).unwrap_err();
        assert_eq!(
            err,
            ResolveError::CircularReference {
                chain: vec!["[calc:a]".into(), "[calc:b]".into(), "[calc:a]".into()]
            }
        );

        assert!(resolver.resolve_formula("self_ref", &fields).unwrap_err().is_circular());
        assert!(resolver.resolve_formula("via_lookup", &fields).unwrap_err().is_circular());
        assert!(resolver.dependencies("a").unwrap_err().is_circular());
    }

    #[test]
    fn depth_limit_applies_to_long_chains() {
        let mut snapshot = CatalogSnapshot::new().with_formula(Formula::new("f0", "1"));
        for i in 1..10 {
            let text = format!("[calc:f{}] + 1", i - 1);
            snapshot = snapshot.with_formula(Formula::new(format!("f{i}"), text));
        }
        let catalog = catalog(snapshot);
        let fields = FieldValues::new();

        let resolver = Resolver::new(&catalog);
        assert_eq!(resolver.resolve_formula("f9", &fields), Ok(Value::Number(10.0)));

        let shallow = resolver.with_config(ResolverConfig::new().with_max_depth(5));
        assert_eq!(
            shallow.resolve_formula("f9", &fields),
            Err(ResolveError::DepthExceeded { limit: 5 })
        );
    }

    #[test]
    fn unknown_and_inactive_references() {
        let catalog = energy_catalog();
        let resolver = Resolver::new(&catalog);
        let fields = sample_submission();

        assert_eq!(
            resolver.resolve("[calc:nope] * 2", &fields),
            Err(ResolveError::UnknownFormula { name: "nope".into() })
        );
        assert_eq!(
            resolver.resolve("[lookup:nope]", &fields),
            Err(ResolveError::UnknownLookup { name: "nope".into() })
        );
        assert_eq!(
            resolver.resolve("[calc:legacy_rate]", &fields),
            Err(ResolveError::InactiveFormula {
                name: "legacy_rate".into()
            })
        );
    }

    #[test]
    fn missing_field_policies() {
        let catalog = catalog(
            CatalogSnapshot::new()
                .with_field(CardField::new("rooms", FieldType::Number))
                .with_field(CardField::new("size", FieldType::Number).required())
                .with_field(CardField::new("price", FieldType::Number).with_default(0.5))
                .with_field(CardField::new("note", FieldType::Text)),
        );
        let fields = FieldValues::new();
        let strict = Resolver::new(&catalog);
        assert_eq!(
            strict.resolve("[field:rooms] + 1", &fields),
            Err(ResolveError::MissingField { name: "rooms".into() })
        );

        let lenient = strict.with_config(
            ResolverConfig::new().with_missing_field_policy(MissingFieldPolicy::TypeDefault),
        );
        assert_eq!(lenient.resolve("[field:rooms] + 1", &fields), Ok(Value::Number(1.0)));
        assert_eq!(lenient.resolve("[field:price] * 2", &fields), Ok(Value::Number(1.0)));
        assert_eq!(lenient.resolve("[field:note]", &fields), Ok(Value::from("")));
        assert!(lenient.resolve("[field:size]", &fields).is_err());
        assert!(lenient.resolve("[field:undeclared]", &fields).is_err());
    }

    #[test]
    fn division_by_zero() {
        let empty = MemoryCatalog::new();
        let resolver = Resolver::new(&empty);
        let fields = FieldValues::new().with("new", 0);
        assert_eq!(
            resolver.resolve("100 / [field:new]", &fields),
            Err(ResolveError::DivisionByZero)
        );
    }

    #[test]
    fn text_templates_and_render() {
        let catalog = energy_catalog();
        let resolver = Resolver::new(&catalog);
        let fields = sample_submission();

        assert_eq!(
            resolver.render("You save [calc:annual_savings] € per year", &fields),
            Ok("You save 1440 € per year".to_string())
        );
        assert_eq!(
            resolver.render("[calc:co2_reduction]", &fields),
            Ok("3.19".to_string())
        );
        assert_eq!(
            resolver.resolve("[field:heating_type]", &fields),
            Ok(Value::from("oil"))
        );
        assert!(resolver.render("Broken [calc:] here", &fields).is_err());
    }

    #[test]
    fn resolved_calc_is_stable_under_reresolution() {
        let catalog = energy_catalog();
        let resolver = Resolver::new(&catalog);
        let fields = FieldValues::new();

        let first = resolver.resolve("[calc:oil-rate]", &fields).unwrap();
        let again = resolver.resolve(&first.to_string(), &fields).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn dependencies_are_transitive() {
        let catalog = energy_catalog();
        let resolver = Resolver::new(&catalog);
        let deps = resolver.dependencies("heating_cost").unwrap();
        let expected: BTreeSet<_> = [
            ShortcodeRef::field("current_consumption"),
            ShortcodeRef::field("heating_type"),
            ShortcodeRef::lookup("heating_rate"),
            ShortcodeRef::calc("oil-rate"),
            ShortcodeRef::calc("gas-rate"),
        ]
        .into_iter()
        .collect();
        assert_eq!(deps, expected);

        assert_eq!(
            resolver.dependencies("nope"),
            Err(ResolveError::UnknownFormula { name: "nope".into() })
        );
    }

    #[test]
    fn stored_formulas_must_be_arithmetic() {
        let catalog = catalog(
            CatalogSnapshot::new()
                .with_formula(Formula::new("modulo", "[field:a] % 2"))
                .with_formula(Formula::new("typo", "rnd([field:a])")),
        );
        let resolver = Resolver::new(&catalog);
        let fields = FieldValues::new().with("a", 2);

        for template in ["[calc:modulo]", "[calc:typo] + 1", "Result: [calc:typo]"] {
            let err = resolver.resolve(template, &fields).unwrap_err();
            assert_eq!(err.kind(), "syntax_error", "{template}");
        }
        let err = resolver.resolve_formula("modulo", &fields).unwrap_err();
        assert!(matches!(err, ResolveError::Syntax { ref origin, .. } if origin == "[calc:modulo]"));
    }

    #[test]
    fn deeply_nested_templates_fail_cleanly() {
        let empty = MemoryCatalog::new();
        let resolver = Resolver::new(&empty);
        let fields = FieldValues::new();

        let parens = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        assert_eq!(resolver.resolve(&parens, &fields).unwrap_err().kind(), "syntax_error");

        let signs = format!("{}1", "-".repeat(200_000));
        assert_eq!(resolver.resolve(&signs, &fields).unwrap_err().kind(), "syntax_error");
    }
}
