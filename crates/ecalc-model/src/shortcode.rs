//! Shortcode references
//!
//! A shortcode is a bracketed reference `[kind:name]` embedded in a template.
//! This module owns the kinds and the name rules; the scanner that finds
//! shortcodes in text lives in `ecalc-expr`.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of catalog table a shortcode points into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcodeKind {
    /// `[field:name]`, a submitted form value
    Field,
    /// `[calc:name]`, a stored formula
    Calc,
    /// `[lookup:name]`, a lookup table
    Lookup,
}

impl ShortcodeKind {
    /// All recognised kinds
    pub const ALL: [ShortcodeKind; 3] = [Self::Field, Self::Calc, Self::Lookup];

    /// Keyword used between `[` and `:`
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::Calc => "calc",
            Self::Lookup => "lookup",
        }
    }
}

impl Display for ShortcodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShortcodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "field" => Ok(Self::Field),
            "calc" => Ok(Self::Calc),
            "lookup" => Ok(Self::Lookup),
            other => Err(format!("unknown shortcode kind: '{other}'")),
        }
    }
}

/// A reference to a named catalog entry
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShortcodeRef {
    /// Table the name is resolved in
    pub kind: ShortcodeKind,
    /// Shortcode key
    pub name: String,
}

impl ShortcodeRef {
    /// Create new reference
    #[inline]
    #[must_use]
    pub fn new(kind: ShortcodeKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// `[field:name]`
    #[inline]
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self::new(ShortcodeKind::Field, name)
    }

    /// `[calc:name]`
    #[inline]
    #[must_use]
    pub fn calc(name: impl Into<String>) -> Self {
        Self::new(ShortcodeKind::Calc, name)
    }

    /// `[lookup:name]`
    #[inline]
    #[must_use]
    pub fn lookup(name: impl Into<String>) -> Self {
        Self::new(ShortcodeKind::Lookup, name)
    }
}

impl Display for ShortcodeRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}]", self.kind, self.name)
    }
}

/// Check whether `name` is a well-formed shortcode key
///
/// Keys start with an ASCII letter, digit or underscore and continue with
/// letters, digits, `_`, `-` or `.`. Stored names such as `oil-rate` or
/// `heating.area_m2` are valid; empty names and names with spaces are not.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
