//! Error types for expression handling
//!
//! Provides error handling for:
//! - Tokenizing and parsing (`SyntaxError`), with byte offsets into the text
//! - Evaluating a parsed tree (`EvalError`)

use std::fmt::{self, Display, Formatter};

/// Why a bracketed token is not a valid shortcode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShortcodeIssue {
    /// `[` without a closing `]` before the next `[` or end of text
    Unterminated,
    /// No `:` between the brackets
    MissingColon,
    /// Kind is not `field`, `calc` or `lookup`
    UnknownKind(String),
    /// Name is empty or has characters outside the name rules
    InvalidName(String),
}

impl Display for ShortcodeIssue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unterminated => f.write_str("missing closing ']'"),
            Self::MissingColon => f.write_str("expected '[kind:name]'"),
            Self::UnknownKind(kind) => write!(f, "unknown shortcode kind '{kind}'"),
            Self::InvalidName(name) if name.is_empty() => f.write_str("empty shortcode name"),
            Self::InvalidName(name) => write!(f, "invalid shortcode name '{name}'"),
        }
    }
}

/// Errors turning text into an expression tree
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyntaxError {
    /// Expression text contained nothing to evaluate
    #[error("empty expression")]
    Empty,

    /// Character outside the whitelist
    #[error("unexpected character '{ch}' at {offset}")]
    UnexpectedChar {
        /// Offending character
        ch: char,
        /// Byte offset
        offset: usize,
    },

    /// Numeric literal that does not parse
    #[error("invalid number '{text}' at {offset}")]
    InvalidNumber {
        /// Literal text
        text: String,
        /// Byte offset
        offset: usize,
    },

    /// Bracketed token that is not a valid shortcode
    #[error("malformed shortcode '{text}' at {offset}: {issue}")]
    MalformedShortcode {
        /// Token text as written
        text: String,
        /// Byte offset of `[`
        offset: usize,
        /// What is wrong with it
        issue: ShortcodeIssue,
    },

    /// Function name outside the whitelist
    #[error("unknown function '{name}' at {offset}")]
    UnknownFunction {
        /// Name as written
        name: String,
        /// Byte offset
        offset: usize,
    },

    /// Function called with the wrong number of arguments
    #[error("{function}() takes {expected} argument(s), got {found}")]
    Arity {
        /// Function name
        function: &'static str,
        /// Accepted argument count, e.g. `1` or `1..=2`
        expected: String,
        /// Arguments given
        found: usize,
    },

    /// `)` without matching `(`
    #[error("unmatched ')' at {offset}")]
    UnmatchedClose {
        /// Byte offset
        offset: usize,
    },

    /// `(` never closed
    #[error("unclosed '(' at {offset}")]
    UnclosedOpen {
        /// Byte offset of the `(`
        offset: usize,
    },

    /// Token in a position the grammar does not allow
    #[error("unexpected {found} at {offset}, expected {expected}")]
    UnexpectedToken {
        /// Token description
        found: String,
        /// What the parser wanted
        expected: &'static str,
        /// Byte offset
        offset: usize,
    },

    /// Nesting deeper than the parser accepts
    #[error("expression nested too deeply at {offset} (limit {limit})", limit = crate::parser::MAX_NESTING)]
    TooDeep {
        /// Byte offset where the limit was crossed
        offset: usize,
    },
}

impl SyntaxError {
    /// Byte offset the error points at, if any
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        match self {
            Self::Empty | Self::Arity { .. } => None,
            Self::UnexpectedChar { offset, .. }
            | Self::InvalidNumber { offset, .. }
            | Self::MalformedShortcode { offset, .. }
            | Self::UnknownFunction { offset, .. }
            | Self::UnmatchedClose { offset }
            | Self::UnclosedOpen { offset }
            | Self::UnexpectedToken { offset, .. }
            | Self::TooDeep { offset } => Some(*offset),
        }
    }
}

/// Errors evaluating a parsed expression
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EvalError {
    /// Right operand of `/` was zero
    #[error("division by zero")]
    DivisionByZero,

    /// Arithmetic on a value without a numeric view
    #[error("value '{0}' is not numeric")]
    NotNumeric(String),

    /// Result is NaN or infinite (e.g. `sqrt(-1)`)
    #[error("{0} produced a non-finite result")]
    NonFinite(&'static str),

    /// Shortcode evaluated without a resolver
    #[error("unresolved shortcode {0}")]
    Unresolved(ecalc_model::ShortcodeRef),
}

/// Combined error for one-shot parse-and-evaluate
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExprError {
    /// Parse failed
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    /// Evaluation failed
    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),
}
