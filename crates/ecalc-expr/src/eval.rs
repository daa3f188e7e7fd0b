//! Tree evaluator
//!
//! Shortcode leaves are delegated to an [`Environment`]; everything else is
//! plain `f64` arithmetic with explicit checks for division by zero and
//! non-finite results.

use ecalc_model::{ShortcodeRef, Value};

use crate::ast::{BinaryOp, Expr};
use crate::error::EvalError;

/// Supplies values for shortcode leaves
pub trait Environment {
    /// Error type, must be able to carry evaluator errors
    type Error: From<EvalError>;

    /// Resolve one shortcode
    ///
    /// # Errors
    /// Whatever the environment considers a resolution failure
    fn resolve(&mut self, reference: &ShortcodeRef) -> Result<Value, Self::Error>;
}

impl<F, E> Environment for F
where
    F: FnMut(&ShortcodeRef) -> Result<Value, E>,
    E: From<EvalError>,
{
    type Error = E;

    fn resolve(&mut self, reference: &ShortcodeRef) -> Result<Value, E> {
        self(reference)
    }
}

/// Environment with no shortcodes; any leaf is an error
#[derive(Debug, Clone, Copy, Default)]
pub struct NoShortcodes;

impl Environment for NoShortcodes {
    type Error = EvalError;

    fn resolve(&mut self, reference: &ShortcodeRef) -> Result<Value, EvalError> {
        Err(EvalError::Unresolved(reference.clone()))
    }
}

impl Expr {
    /// Evaluate the tree
    ///
    /// A leaf returns its value unchanged (text included); any other shape
    /// is numeric and must end finite.
    ///
    /// # Errors
    /// Returns environment errors as-is and evaluator errors converted
    pub fn evaluate<E: Environment>(&self, env: &mut E) -> Result<Value, E::Error> {
        match self {
            Self::Number(n) => Ok(Value::Number(*n)),
            Self::Shortcode(reference) => env.resolve(reference),
            _ => Ok(Value::Number(self.evaluate_number(env)?)),
        }
    }

    fn evaluate_number<E: Environment>(&self, env: &mut E) -> Result<f64, E::Error> {
        let n = match self {
            Self::Number(n) => *n,
            Self::Shortcode(reference) => numeric(&env.resolve(reference)?)?,
            Self::Neg(inner) => -inner.evaluate_number(env)?,
            Self::Binary { op, lhs, rhs } => {
                let l = lhs.evaluate_number(env)?;
                let r = rhs.evaluate_number(env)?;
                match op {
                    BinaryOp::Add => l + r,
                    BinaryOp::Sub => l - r,
                    BinaryOp::Mul => l * r,
                    BinaryOp::Div => {
                        if r == 0.0 {
                            return Err(EvalError::DivisionByZero.into());
                        }
                        l / r
                    }
                }
            }
            Self::Call { function, args } => {
                let values = args
                    .iter()
                    .map(|arg| arg.evaluate_number(env))
                    .collect::<Result<Vec<_>, _>>()?;
                function.apply(&values)?
            }
        };

        if n.is_finite() {
            Ok(n)
        } else {
            Err(EvalError::NonFinite("arithmetic").into())
        }
    }
}

/// Numeric view of a resolved value
///
/// # Errors
/// Returns [`EvalError::NotNumeric`] for text without a numeric reading
pub fn numeric(value: &Value) -> Result<f64, EvalError> {
    value
        .as_number()
        .ok_or_else(|| EvalError::NotNumeric(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn eval(text: &str) -> Result<Value, EvalError> {
        parse(text).unwrap().evaluate(&mut NoShortcodes)
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("2 + 3 * 4"), Ok(Value::Number(14.0)));
        assert_eq!(eval("(2 + 3) * 4"), Ok(Value::Number(20.0)));
        assert_eq!(eval("-2 * -3"), Ok(Value::Number(6.0)));
        assert_eq!(eval("7 / 2"), Ok(Value::Number(3.5)));
        assert_eq!(eval("round(sqrt(2) * 100) / 100"), Ok(Value::Number(1.41)));
    }

    #[test]
    fn division_by_zero_is_an_error() {
        assert_eq!(eval("1 / 0"), Err(EvalError::DivisionByZero));
        assert_eq!(eval("1 / (2 - 2)"), Err(EvalError::DivisionByZero));
        assert_eq!(eval("0 / 0"), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn overflow_is_non_finite() {
        assert_eq!(eval("1e308 * 10"), Err(EvalError::NonFinite("arithmetic")));
    }

    #[test]
    fn leaves_pass_values_through() {
        let expr = parse("[field:type]").unwrap();
        let mut env = |_: &ShortcodeRef| Ok::<_, EvalError>(Value::from("oil"));
        assert_eq!(expr.evaluate(&mut env), Ok(Value::from("oil")));
    }

    #[test]
    fn text_in_arithmetic_is_rejected() {
        let expr = parse("[field:type] * 2").unwrap();
        let mut env = |_: &ShortcodeRef| Ok::<_, EvalError>(Value::from("oil"));
        assert_eq!(expr.evaluate(&mut env), Err(EvalError::NotNumeric("oil".into())));

        let mut numeric_text = |_: &ShortcodeRef| Ok::<_, EvalError>(Value::from("21"));
        assert_eq!(expr.evaluate(&mut numeric_text), Ok(Value::Number(42.0)));
    }

    #[test]
    fn shortcodes_without_environment_fail() {
        assert_eq!(
            eval("[calc:x] + 1"),
            Err(EvalError::Unresolved(ShortcodeRef::calc("x")))
        );
    }

    #[test]
    fn resolves_left_to_right() {
        let expr = parse("[field:a] - [field:b] * [field:c]").unwrap();
        let mut seen = Vec::new();
        let mut env = |r: &ShortcodeRef| {
            seen.push(r.name.clone());
            Ok::<_, EvalError>(Value::Number(1.0))
        };
        expr.evaluate(&mut env).unwrap();
        assert_eq!(seen, ["a", "b", "c"]);
    }
}
