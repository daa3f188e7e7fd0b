//! Whitelisted functions
//!
//! Stored formulas were authored against a JavaScript host, so the legacy
//! `Math.` prefix is accepted and `round` keeps the host's half-up rule.

use std::fmt::{self, Display, Formatter};
use std::ops::RangeInclusive;

use crate::error::EvalError;

/// A callable function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    /// `round(x)` or `round(x, digits)`
    Round,
    /// `sqrt(x)`
    Sqrt,
    /// `max(a, ...)`
    Max,
    /// `min(a, ...)`
    Min,
    /// `abs(x)`
    Abs,
    /// `floor(x)`
    Floor,
    /// `ceil(x)`
    Ceil,
}

impl Function {
    /// Every whitelisted function
    pub const ALL: [Function; 7] = [
        Self::Round,
        Self::Sqrt,
        Self::Max,
        Self::Min,
        Self::Abs,
        Self::Floor,
        Self::Ceil,
    ];

    /// Look up by name as written in a formula
    ///
    /// Case-insensitive; an optional `Math.` prefix is ignored.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let bare = name
            .strip_prefix("Math.")
            .or_else(|| name.strip_prefix("math."))
            .unwrap_or(name);
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(bare))
    }

    /// Canonical name
    #[inline]
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Round => "round",
            Self::Sqrt => "sqrt",
            Self::Max => "max",
            Self::Min => "min",
            Self::Abs => "abs",
            Self::Floor => "floor",
            Self::Ceil => "ceil",
        }
    }

    /// Accepted argument counts
    #[must_use]
    pub fn arity(self) -> RangeInclusive<usize> {
        match self {
            Self::Round => 1..=2,
            Self::Max | Self::Min => 1..=usize::MAX,
            Self::Sqrt | Self::Abs | Self::Floor | Self::Ceil => 1..=1,
        }
    }

    /// Human-readable arity for diagnostics
    #[must_use]
    pub fn arity_label(self) -> String {
        let range = self.arity();
        match (*range.start(), *range.end()) {
            (lo, hi) if lo == hi => lo.to_string(),
            (lo, usize::MAX) => format!("at least {lo}"),
            (lo, hi) => format!("{lo} to {hi}"),
        }
    }

    /// Apply to already-evaluated arguments
    ///
    /// # Errors
    /// Returns [`EvalError::NonFinite`] when the result is NaN or infinite
    pub fn apply(self, args: &[f64]) -> Result<f64, EvalError> {
        let result = match self {
            Self::Round => match args {
                [x] => round_half_up(*x),
                [x, digits] => {
                    #[allow(clippy::cast_possible_truncation)]
                    let digits = digits.trunc().clamp(-15.0, 15.0) as i32;
                    // Divide by exact powers of ten rather than multiply by inexact ones
                    if digits >= 0 {
                        let scale = 10f64.powi(digits);
                        round_half_up(x * scale) / scale
                    } else {
                        let scale = 10f64.powi(-digits);
                        round_half_up(x / scale) * scale
                    }
                }
                _ => f64::NAN,
            },
            Self::Sqrt => args[0].sqrt(),
            Self::Max => args.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Self::Min => args.iter().copied().fold(f64::INFINITY, f64::min),
            Self::Abs => args[0].abs(),
            Self::Floor => args[0].floor(),
            Self::Ceil => args[0].ceil(),
        };

        if result.is_finite() {
            Ok(result)
        } else {
            Err(EvalError::NonFinite(self.name()))
        }
    }
}

impl Display for Function {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Round to nearest integer, halves toward positive infinity
fn round_half_up(x: f64) -> f64 {
    if (x - x.trunc()).abs() == 0.5 {
        x.ceil()
    } else {
        x.round()
    }
}
