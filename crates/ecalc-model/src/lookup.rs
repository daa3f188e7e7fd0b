//! Lookup tables
//!
//! A lookup is an ordered list of conditions. Resolution walks the list in
//! stored order and takes the first condition whose rule matches; the order
//! is part of the data and is preserved through serialization.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ConditionParseError;
use crate::value::Value;

/// A named, ordered condition table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaLookup {
    /// Row identifier
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Unique shortcode key
    pub name: String,

    /// Display title
    #[serde(default)]
    pub title: String,

    /// Free-form description
    #[serde(default)]
    pub description: Option<String>,

    /// Conditions in evaluation order
    #[serde(default)]
    pub conditions: Vec<LookupCondition>,

    /// Applied when no condition matches
    #[serde(default)]
    pub default_action: LookupDefault,
}

impl FormulaLookup {
    /// Create an empty lookup that fails on miss
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: Uuid::new_v4(),
            title: name.clone(),
            name,
            description: None,
            conditions: Vec::new(),
            default_action: LookupDefault::Error,
        }
    }

    /// Append a condition
    #[inline]
    #[must_use]
    pub fn when(mut self, rule: ConditionRule, target: impl Into<LookupTarget>) -> Self {
        self.conditions.push(LookupCondition::new(rule, target));
        self
    }

    /// Set the fallback used when no condition matches
    #[inline]
    #[must_use]
    pub fn otherwise(mut self, target: impl Into<LookupTarget>) -> Self {
        self.default_action = LookupDefault::Fallback {
            target: target.into(),
        };
        self
    }
}

/// One row of a lookup table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupCondition {
    /// Rule to test against the submitted fields
    #[serde(alias = "condition_rule", alias = "condition_logic")]
    pub rule: ConditionRule,

    /// What the lookup resolves to when the rule matches
    #[serde(alias = "target_shortcode", alias = "action_config")]
    pub target: LookupTarget,

    /// Operator note
    #[serde(default)]
    pub description: Option<String>,
}

impl LookupCondition {
    /// Create condition without description
    #[inline]
    #[must_use]
    pub fn new(rule: ConditionRule, target: impl Into<LookupTarget>) -> Self {
        Self {
            rule,
            target: target.into(),
            description: None,
        }
    }
}

/// Result of a matched condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LookupTarget {
    /// Template resolved recursively, typically `[calc:name]`
    Template(String),
    /// Literal value returned as-is
    Literal {
        /// The value
        value: Value,
    },
}

impl From<&str> for LookupTarget {
    fn from(s: &str) -> Self {
        Self::Template(s.to_string())
    }
}

impl From<String> for LookupTarget {
    fn from(s: String) -> Self {
        Self::Template(s)
    }
}

impl From<Value> for LookupTarget {
    fn from(value: Value) -> Self {
        Self::Literal { value }
    }
}

/// Behaviour when no condition matches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LookupDefault {
    /// Fail with a lookup-miss error
    #[default]
    Error,
    /// Resolve a fallback target
    Fallback {
        /// Target used on miss
        target: LookupTarget,
    },
}

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    /// `==`
    #[serde(rename = "==", alias = "eq")]
    Eq,
    /// `!=`
    #[serde(rename = "!=", alias = "ne")]
    Ne,
    /// `<`
    #[serde(rename = "<", alias = "lt")]
    Lt,
    /// `>`
    #[serde(rename = ">", alias = "gt")]
    Gt,
    /// `<=`
    #[serde(rename = "<=", alias = "le")]
    Le,
    /// `>=`
    #[serde(rename = ">=", alias = "ge")]
    Ge,
}

impl ComparisonOp {
    /// Operators recognised by the textual rule parser
    const SCAN_ORDER: [ComparisonOp; 6] = [Self::Eq, Self::Ne, Self::Le, Self::Ge, Self::Lt, Self::Gt];

    /// Operator symbol
    #[inline]
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }

    /// Compare two values
    ///
    /// Numeric comparison when both sides have a numeric view, otherwise
    /// string comparison of their display forms.
    #[must_use]
    pub fn compare(self, left: &Value, right: &Value) -> bool {
        let ordering = match (left.as_number(), right.as_number()) {
            (Some(l), Some(r)) => l.partial_cmp(&r),
            _ => Some(left.to_string().cmp(&right.to_string())),
        };
        let Some(ordering) = ordering else {
            return false;
        };
        match self {
            Self::Eq => ordering.is_eq(),
            Self::Ne => ordering.is_ne(),
            Self::Lt => ordering.is_lt(),
            Self::Gt => ordering.is_gt(),
            Self::Le => ordering.is_le(),
            Self::Ge => ordering.is_ge(),
        }
    }
}

impl Display for ComparisonOp {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Rule deciding whether a condition applies
///
/// Stored either structured (`{"kind": "compare", ...}`) or in the legacy
/// textual form (`"heating_type == oil"`); both deserialize to this type.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConditionRule {
    /// Compare a submitted field against a constant
    Compare {
        /// Field name
        field: String,
        /// Operator
        op: ComparisonOp,
        /// Constant compared against
        value: Value,
    },
    /// All sub-rules must match
    All {
        /// Sub-rules
        rules: Vec<ConditionRule>,
    },
    /// At least one sub-rule must match
    Any {
        /// Sub-rules
        rules: Vec<ConditionRule>,
    },
    /// Always matches
    Always,
}

impl ConditionRule {
    /// Shorthand for a comparison rule
    #[must_use]
    pub fn compare(field: impl Into<String>, op: ComparisonOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// Shorthand for `field == value`
    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(field, ComparisonOp::Eq, value)
    }

    /// Evaluate against a field accessor
    ///
    /// A comparison whose field has no value does not match.
    pub fn matches<F>(&self, field: &F) -> bool
    where
        F: Fn(&str) -> Option<Value>,
    {
        match self {
            Self::Compare { field: name, op, value } => {
                field(name).is_some_and(|actual| op.compare(&actual, value))
            }
            Self::All { rules } => rules.iter().all(|r| r.matches(field)),
            Self::Any { rules } => rules.iter().any(|r| r.matches(field)),
            Self::Always => true,
        }
    }

    /// Field names the rule reads, in first-seen order
    #[must_use]
    pub fn fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Self::Compare { field, .. } => {
                if !out.contains(&field.as_str()) {
                    out.push(field);
                }
            }
            Self::All { rules } | Self::Any { rules } => {
                for rule in rules {
                    rule.collect_fields(out);
                }
            }
            Self::Always => {}
        }
    }

    fn parse_comparison(text: &str) -> Result<Self, ConditionParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConditionParseError::Empty);
        }
        if matches!(text, "true" | "always" | "default" | "*") {
            return Ok(Self::Always);
        }

        // Operators inside a quoted value are part of the value
        let head = &text[..text.find(['"', '\'']).unwrap_or(text.len())];
        let (idx, op) = ComparisonOp::SCAN_ORDER
            .iter()
            .filter_map(|op| head.find(op.symbol()).map(|idx| (idx, *op)))
            .min_by_key(|(idx, op)| (*idx, std::cmp::Reverse(op.symbol().len())))
            .ok_or_else(|| ConditionParseError::MissingOperator(text.to_string()))?;

        let lhs = text[..idx].trim();
        let rhs = text[idx + op.symbol().len()..].trim();

        let field = lhs
            .strip_prefix("[field:")
            .and_then(|s| s.strip_suffix(']'))
            .unwrap_or(lhs);
        if !crate::shortcode::is_valid_name(field) {
            return Err(ConditionParseError::InvalidField(lhs.to_string()));
        }
        if rhs.is_empty() {
            return Err(ConditionParseError::MissingValue(text.to_string()));
        }

        let unquoted = rhs
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .or_else(|| rhs.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
        let value = match unquoted {
            Some(s) => Value::Text(s.to_string()),
            None => rhs
                .parse::<f64>()
                .map_or_else(|_| Value::Text(rhs.to_string()), Value::Number),
        };

        Ok(Self::compare(field, op, value))
    }
}

impl FromStr for ConditionRule {
    type Err = ConditionParseError;

    /// Parse the legacy textual form
    ///
    /// `||` binds looser than `&&`; no parentheses.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut any = Vec::new();
        for alternative in split_unquoted(s, "||") {
            let mut all = split_unquoted(alternative, "&&")
                .into_iter()
                .map(Self::parse_comparison)
                .collect::<Result<Vec<_>, _>>()?;
            any.push(if all.len() == 1 { all.remove(0) } else { Self::All { rules: all } });
        }
        Ok(if any.len() == 1 { any.remove(0) } else { Self::Any { rules: any } })
    }
}

/// Split on `sep` where it is not inside a quoted value
fn split_unquoted<'a>(text: &'a str, sep: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut quote = None;
    let mut start = 0;
    let mut i = 0;
    while let Some(ch) = text[i..].chars().next() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if text[i..].starts_with(sep) => {
                parts.push(&text[start..i]);
                i += sep.len();
                start = i;
                continue;
            }
            None => {}
        }
        i += ch.len_utf8();
    }
    parts.push(&text[start..]);
    parts
}

/// Wire forms accepted for a rule
#[derive(Deserialize)]
#[serde(untagged)]
enum RuleRepr {
    Text(String),
    Structured(StructuredRule),
}

#[derive(Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StructuredRule {
    Compare {
        field: String,
        op: ComparisonOp,
        value: Value,
    },
    All {
        rules: Vec<ConditionRule>,
    },
    Any {
        rules: Vec<ConditionRule>,
    },
    Always,
}

impl<'de> Deserialize<'de> for ConditionRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RuleRepr::deserialize(deserializer)?
            .try_into()
            .map_err(de::Error::custom)
    }
}

impl TryFrom<RuleRepr> for ConditionRule {
    type Error = ConditionParseError;

    fn try_from(repr: RuleRepr) -> Result<Self, Self::Error> {
        match repr {
            RuleRepr::Text(text) => text.parse(),
            RuleRepr::Structured(StructuredRule::Compare { field, op, value }) => {
                Ok(Self::Compare { field, op, value })
            }
            RuleRepr::Structured(StructuredRule::All { rules }) => Ok(Self::All { rules }),
            RuleRepr::Structured(StructuredRule::Any { rules }) => Ok(Self::Any { rules }),
            RuleRepr::Structured(StructuredRule::Always) => Ok(Self::Always),
        }
    }
}
