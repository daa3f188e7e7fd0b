//! ecalc Expressions
//!
//! Whitelisted arithmetic over numbers, shortcodes and a handful of
//! functions. Formula text is tokenized, parsed by recursive descent into an
//! [`Expr`] tree and evaluated by walking the tree; nothing is ever handed to
//! a host interpreter.
//!
//! # Example
//!
//! ```rust
//! use ecalc_expr::{evaluate, parse};
//! use ecalc_model::{ShortcodeRef, Value};
//!
//! assert_eq!(evaluate("2 + 3 * 4").unwrap(), Value::Number(14.0));
//!
//! let expr = parse("[field:a] + [field:b]").unwrap();
//! let mut env = |r: &ShortcodeRef| -> Result<Value, ecalc_expr::EvalError> {
//!     Ok(Value::Number(if r.name == "a" { 2.0 } else { 3.0 }))
//! };
//! assert_eq!(expr.evaluate(&mut env).unwrap(), Value::Number(5.0));
//! ```

#![warn(missing_docs)]

pub mod ast;
pub mod error;
pub mod eval;
pub mod functions;
pub mod parser;
pub mod shortcode;
pub mod tokenizer;

// Re-exports
pub use ast::{BinaryOp, Expr};
pub use error::{EvalError, ExprError, ShortcodeIssue, SyntaxError};
pub use eval::{numeric, Environment, NoShortcodes};
pub use functions::Function;
pub use parser::{parse, MAX_NESTING};
pub use shortcode::{references, scan, ShortcodeMatch};
pub use tokenizer::{Token, TokenKind, Tokenizer};

use ecalc_model::Value;

/// Parse and evaluate text that contains no shortcodes
///
/// # Errors
/// Returns syntax errors, evaluation errors, or [`EvalError::Unresolved`] if
/// the text references a shortcode
pub fn evaluate(text: &str) -> Result<Value, ExprError> {
    Ok(parse(text)?.evaluate(&mut NoShortcodes)?)
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    /// Reference tree with its expected value, built alongside the text
    fn arb_expr() -> impl Strategy<Value = (String, f64)> {
        let leaf = (0u32..1000).prop_map(|n| (n.to_string(), f64::from(n)));
        leaf.prop_recursive(4, 32, 2, |inner| {
            (inner.clone(), prop_oneof![Just('+'), Just('-'), Just('*')], inner).prop_map(
                |((l, lv), op, (r, rv))| {
                    let value = match op {
                        '+' => lv + rv,
                        '-' => lv - rv,
                        _ => lv * rv,
                    };
                    (format!("({l} {op} {r})"), value)
                },
            )
        })
    }

    proptest! {
        #[test]
        fn prop_parenthesized_arithmetic_matches_reference((text, expected) in arb_expr()) {
            let value = evaluate(&text).unwrap();
            prop_assert_eq!(value, Value::Number(expected));
        }

        #[test]
        fn prop_display_reparses_to_same_tree((text, _) in arb_expr()) {
            let expr = parse(&text).unwrap();
            let reparsed = parse(&expr.to_string()).unwrap();
            prop_assert_eq!(reparsed, expr);
        }

        #[test]
        fn prop_tokenizer_never_panics(text in "\\PC{0,40}") {
            let _ = parse(&text);
        }
    }
}
