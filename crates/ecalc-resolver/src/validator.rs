//! Static formula validation
//!
//! Checks formula text without evaluating it and reports every problem
//! found, not just the first. Reference extraction goes through the same
//! shortcode scanner the resolver uses, so [`ValidationReport::references`]
//! is exactly what resolution would look up.
//!
//! With a catalog attached, the validator also warns about references the
//! catalog cannot satisfy and rejects formulas that would reach themselves.

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use ecalc_expr::{parse, scan, Function, SyntaxError};
use ecalc_model::{
    Catalog, Formula, FormulaLookup, LookupDefault, LookupTarget, ShortcodeKind, ShortcodeRef,
};
use serde::{Deserialize, Serialize};

use crate::resolver::Resolver;
use crate::template::{classify, TemplateKind};

/// Category of a validation finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    /// Text is empty or whitespace
    EmptyFormula,
    /// `[...]` that is not a valid shortcode
    MalformedShortcode,
    /// Character outside the expression alphabet
    DisallowedCharacter,
    /// Parentheses do not pair up
    UnbalancedParentheses,
    /// Identifier that is not a whitelisted function
    UnknownFunction,
    /// Expression does not parse
    Syntax,
    /// Formula or lookup missing from the catalog
    UnknownReference,
    /// Formula exists but is inactive
    InactiveReference,
    /// Field not declared as a card field
    UndeclaredField,
    /// Formula references itself directly
    SelfReference,
    /// Formula reaches itself through other records
    CircularReference,
}

impl IssueCode {
    /// Get code as string
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EmptyFormula => "empty_formula",
            Self::MalformedShortcode => "malformed_shortcode",
            Self::DisallowedCharacter => "disallowed_character",
            Self::UnbalancedParentheses => "unbalanced_parentheses",
            Self::UnknownFunction => "unknown_function",
            Self::Syntax => "syntax",
            Self::UnknownReference => "unknown_reference",
            Self::InactiveReference => "inactive_reference",
            Self::UndeclaredField => "undeclared_field",
            Self::SelfReference => "self_reference",
            Self::CircularReference => "circular_reference",
        }
    }
}

impl Display for IssueCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Category
    pub code: IssueCode,
    /// Human-readable message
    pub message: String,
    /// Byte offset into the text, when the finding has a position
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<usize>,
}

impl ValidationIssue {
    fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            offset: None,
        }
    }

    fn at(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

impl Display for ValidationIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "[{}] {} (at {})", self.code, self.message, offset),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

/// Outcome of validating one piece of text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Problems that make the formula unusable
    pub errors: Vec<ValidationIssue>,
    /// Problems worth showing but not blocking
    pub warnings: Vec<ValidationIssue>,
    /// Well-formed shortcodes found in the text
    pub references: BTreeSet<ShortcodeRef>,
}

impl ValidationReport {
    /// True when there are no errors
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Check whether any error carries `code`
    #[must_use]
    pub fn has_error(&self, code: IssueCode) -> bool {
        self.errors.iter().any(|i| i.code == code)
    }

    /// Check whether any warning carries `code`
    #[must_use]
    pub fn has_warning(&self, code: IssueCode) -> bool {
        self.warnings.iter().any(|i| i.code == code)
    }

    fn error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    fn warn(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.references.extend(other.references);
    }
}

/// Static formula checker
#[derive(Clone, Copy, Default)]
pub struct FormulaValidator<'a> {
    catalog: Option<&'a dyn Catalog>,
}

impl fmt::Debug for FormulaValidator<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormulaValidator")
            .field("catalog", &self.catalog.is_some())
            .finish()
    }
}

impl<'a> FormulaValidator<'a> {
    /// Create validator without catalog checks
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self { catalog: None }
    }

    /// Create validator that also checks references against `catalog`
    #[inline]
    #[must_use]
    pub fn with_catalog(catalog: &'a dyn Catalog) -> Self {
        Self {
            catalog: Some(catalog),
        }
    }

    /// Validate formula text
    #[must_use]
    pub fn validate(&self, text: &str) -> ValidationReport {
        let mut report = check_text(text);
        if let Some(catalog) = self.catalog {
            check_references(catalog, &mut report);
        }
        report
    }

    /// Validate a stored formula, including self and circular references
    ///
    /// The formula's own text is used even if the catalog holds an older
    /// version under the same name.
    #[must_use]
    pub fn validate_formula(&self, formula: &Formula) -> ValidationReport {
        let mut report = self.validate(&formula.formula_text);
        let own = ShortcodeRef::calc(formula.name.as_str());

        if report.references.contains(&own) {
            report.error(ValidationIssue::new(
                IssueCode::SelfReference,
                format!("formula '{}' references itself", formula.name),
            ));
        } else if let Some(catalog) = self.catalog {
            let resolver = Resolver::new(catalog);
            let path = report
                .references
                .iter()
                .find_map(|start| path_to(&resolver, start, &own));
            if let Some(path) = path {
                let mut chain = vec![own.to_string()];
                chain.extend(path.iter().map(ToString::to_string));
                report.error(ValidationIssue::new(
                    IssueCode::CircularReference,
                    format!("circular reference: {}", chain.join(" -> ")),
                ));
            }
        }

        report
    }

    /// Validate every template of a lookup table
    ///
    /// Templates are classified the way the resolver classifies them: text
    /// templates only need well-formed shortcodes, arithmetic ones get the
    /// full formula checks. Literal targets need no checks. Fields compared
    /// by conditions count as references.
    #[must_use]
    pub fn validate_lookup(&self, lookup: &FormulaLookup) -> ValidationReport {
        let mut report = ValidationReport::default();
        let defaults = match &lookup.default_action {
            LookupDefault::Fallback { target } => Some(target),
            LookupDefault::Error => None,
        };
        let targets = lookup.conditions.iter().map(|c| &c.target).chain(defaults);

        for target in targets {
            if let LookupTarget::Template(text) = target {
                let checked = match classify(text) {
                    Ok(TemplateKind::Arithmetic) => check_text(text),
                    Ok(TemplateKind::Text) | Err(_) => check_shortcodes(text),
                };
                report.merge(checked);
            }
        }
        for condition in &lookup.conditions {
            report
                .references
                .extend(condition.rule.fields().into_iter().map(ShortcodeRef::field));
        }

        if let Some(catalog) = self.catalog {
            check_references(catalog, &mut report);
        }
        report
    }
}

/// Shortcode checks for a text template
fn check_shortcodes(text: &str) -> ValidationReport {
    let mut report = ValidationReport::default();
    for found in scan(text) {
        match found {
            Ok(m) => {
                report.references.insert(m.reference);
            }
            Err(err) => {
                let issue = ValidationIssue::new(IssueCode::MalformedShortcode, err.to_string());
                report.error(match err.offset() {
                    Some(offset) => issue.at(offset),
                    None => issue,
                });
            }
        }
    }
    report
}

/// Catalog-independent checks
fn check_text(text: &str) -> ValidationReport {
    let mut report = ValidationReport::default();
    if text.trim().is_empty() {
        report.error(ValidationIssue::new(IssueCode::EmptyFormula, "formula is empty"));
        return report;
    }

    // Byte ranges covered by shortcodes, well-formed or not
    let mut spans = Vec::new();
    for found in scan(text) {
        match found {
            Ok(m) => {
                spans.push((m.start, m.end));
                report.references.insert(m.reference);
            }
            Err(err) => {
                let mut issue = ValidationIssue::new(IssueCode::MalformedShortcode, err.to_string());
                if let SyntaxError::MalformedShortcode { text: raw, offset, .. } = &err {
                    spans.push((*offset, offset + raw.len().max(1)));
                    issue = issue.at(*offset);
                }
                report.error(issue);
            }
        }
    }

    check_outside_shortcodes(text, &spans, &mut report);

    if report.is_valid() {
        if let Err(err) = parse(text) {
            let offset = err.offset();
            let issue = ValidationIssue::new(IssueCode::Syntax, err.to_string());
            report.error(match offset {
                Some(offset) => issue.at(offset),
                None => issue,
            });
        }
    }
    report
}

/// Characters, parentheses and identifiers outside shortcode spans
fn check_outside_shortcodes(text: &str, spans: &[(usize, usize)], report: &mut ValidationReport) {
    let mut depth = 0usize;
    let mut open_at = Vec::new();
    let mut span = spans.iter().peekable();
    let mut prev: Option<char> = None;
    let mut chars = text.char_indices().peekable();

    while let Some((offset, ch)) = chars.next() {
        while span.peek().is_some_and(|(_, end)| *end <= offset) {
            span.next();
        }
        if span.peek().is_some_and(|(start, _)| *start <= offset) {
            prev = Some(']');
            continue;
        }

        match ch {
            '(' => {
                depth += 1;
                open_at.push(offset);
            }
            ')' => {
                if depth == 0 {
                    let issue = ValidationIssue::new(IssueCode::UnbalancedParentheses, "unmatched ')'");
                    report.error(issue.at(offset));
                } else {
                    depth -= 1;
                    open_at.pop();
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let part_of_number = prev.is_some_and(|p| p.is_ascii_alphanumeric() || p == '.');
                let mut end = offset + c.len_utf8();
                while let Some(&(i, next)) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' || next == '.' {
                        end = i + next.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let word = &text[offset..end];
                if !part_of_number && Function::from_name(word).is_none() {
                    let message = format!("unknown function '{word}'");
                    report.error(ValidationIssue::new(IssueCode::UnknownFunction, message).at(offset));
                }
                prev = word.chars().last();
                continue;
            }
            c if c.is_ascii_digit() || c.is_whitespace() => {}
            '+' | '-' | '*' | '/' | '.' | ',' => {}
            other => {
                report.error(
                    ValidationIssue::new(
                        IssueCode::DisallowedCharacter,
                        format!("character '{other}' is not allowed"),
                    )
                    .at(offset),
                );
            }
        }
        prev = Some(ch);
    }

    for offset in open_at {
        let issue = ValidationIssue::new(IssueCode::UnbalancedParentheses, "unclosed '('");
        report.error(issue.at(offset));
    }
}

/// Warnings for references the catalog cannot satisfy
fn check_references(catalog: &dyn Catalog, report: &mut ValidationReport) {
    let mut warnings = Vec::new();
    for reference in &report.references {
        let name = &reference.name;
        let issue = match reference.kind {
            ShortcodeKind::Field if catalog.card_field(name).is_none() => Some(ValidationIssue::new(
                IssueCode::UndeclaredField,
                format!("field '{name}' is not declared as a card field"),
            )),
            ShortcodeKind::Calc => match catalog.formula(name) {
                None => Some(ValidationIssue::new(
                    IssueCode::UnknownReference,
                    format!("formula '{name}' does not exist"),
                )),
                Some(f) if !f.is_active => Some(ValidationIssue::new(
                    IssueCode::InactiveReference,
                    format!("formula '{name}' is inactive"),
                )),
                Some(_) => None,
            },
            ShortcodeKind::Lookup if catalog.lookup(name).is_none() => Some(ValidationIssue::new(
                IssueCode::UnknownReference,
                format!("lookup '{name}' does not exist"),
            )),
            _ => None,
        };
        warnings.extend(issue);
    }
    for warning in warnings {
        report.warn(warning);
    }
}

/// Path of references from `start` to `target`, both ends included
fn path_to(
    resolver: &Resolver<'_>,
    start: &ShortcodeRef,
    target: &ShortcodeRef,
) -> Option<Vec<ShortcodeRef>> {
    let mut visited = BTreeSet::new();
    let mut path = Vec::new();
    if search(resolver, start, target, &mut visited, &mut path) {
        Some(path)
    } else {
        None
    }
}

fn search(
    resolver: &Resolver<'_>,
    at: &ShortcodeRef,
    target: &ShortcodeRef,
    visited: &mut BTreeSet<ShortcodeRef>,
    path: &mut Vec<ShortcodeRef>,
) -> bool {
    if at.kind == ShortcodeKind::Field || !visited.insert(at.clone()) {
        return false;
    }
    path.push(at.clone());
    if at == target {
        return true;
    }
    for next in resolver.direct_references(at) {
        if search(resolver, &next, target, visited, path) {
            return true;
        }
    }
    path.pop();
    false
}
