//! Expression tree

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};

use ecalc_model::{ShortcodeRef, Value};

use crate::functions::Function;

/// Binary arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

impl BinaryOp {
    /// Binding strength, higher binds tighter
    #[inline]
    #[must_use]
    pub fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div => 2,
        }
    }

    /// Operator symbol
    #[inline]
    #[must_use]
    pub fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
            Self::Div => '/',
        }
    }
}

/// Parsed expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Numeric literal
    Number(f64),
    /// Shortcode leaf, resolved at evaluation time
    Shortcode(ShortcodeRef),
    /// Unary minus
    Neg(Box<Expr>),
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand
        lhs: Box<Expr>,
        /// Right operand
        rhs: Box<Expr>,
    },
    /// Whitelisted function call
    Call {
        /// Function
        function: Function,
        /// Arguments, arity already checked
        args: Vec<Expr>,
    },
}

impl Expr {
    /// Build a binary node
    #[must_use]
    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Whether the tree is a single literal or shortcode
    ///
    /// Leaves pass their value through unchanged, so a template that is just
    /// `[field:type]` yields the submitted string.
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, Self::Number(_) | Self::Shortcode(_))
    }

    /// Shortcodes referenced anywhere in the tree
    #[must_use]
    pub fn references(&self) -> BTreeSet<ShortcodeRef> {
        let mut out = BTreeSet::new();
        self.visit_references(&mut |r| {
            out.insert(r.clone());
        });
        out
    }

    /// Call `f` for each shortcode leaf, left to right
    pub fn visit_references<F: FnMut(&ShortcodeRef)>(&self, f: &mut F) {
        match self {
            Self::Number(_) => {}
            Self::Shortcode(r) => f(r),
            Self::Neg(inner) => inner.visit_references(f),
            Self::Binary { lhs, rhs, .. } => {
                lhs.visit_references(f);
                rhs.visit_references(f);
            }
            Self::Call { args, .. } => {
                for arg in args {
                    arg.visit_references(f);
                }
            }
        }
    }

    fn fmt_operand(&self, f: &mut Formatter<'_>, parent: BinaryOp, right: bool) -> fmt::Result {
        let needs_parens = match self {
            Self::Binary { op, .. } => {
                op.precedence() < parent.precedence()
                    || (right
                        && op.precedence() == parent.precedence()
                        && matches!(parent, BinaryOp::Sub | BinaryOp::Div))
            }
            _ => false,
        };
        if needs_parens {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

/// Canonical text form, parenthesized only where precedence requires
impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", Value::Number(*n)),
            Self::Shortcode(r) => write!(f, "{r}"),
            Self::Neg(inner) => {
                if matches!(**inner, Self::Binary { .. }) {
                    write!(f, "-({inner})")
                } else {
                    write!(f, "-{inner}")
                }
            }
            Self::Binary { op, lhs, rhs } => {
                lhs.fmt_operand(f, *op, false)?;
                write!(f, " {} ", op.symbol())?;
                rhs.fmt_operand(f, *op, true)
            }
            Self::Call { function, args } => {
                write!(f, "{function}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}
