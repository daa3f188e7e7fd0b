//! Recursive-descent parser
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/') unary)*
//! unary   := ('-' | '+') unary | primary
//! primary := NUMBER | SHORTCODE | IDENT '(' args ')' | '(' expr ')'
//! args    := expr (',' expr)*
//! ```
//!
//! Both the parser's recursion and the height of the resulting tree are
//! capped at [`MAX_NESTING`], so evaluating, printing or dropping any tree
//! the parser hands out stays within a small, fixed stack budget.

use crate::ast::{BinaryOp, Expr};
use crate::error::SyntaxError;
use crate::functions::Function;
use crate::tokenizer::{Token, TokenKind, Tokenizer};

/// Deepest accepted nesting of parentheses, signs, calls and operator chains
pub const MAX_NESTING: usize = 256;

/// Parse formula text into an expression tree
///
/// # Errors
/// Returns the first lexical or grammatical error, or
/// [`SyntaxError::TooDeep`] past [`MAX_NESTING`]
pub fn parse(input: &str) -> Result<Expr, SyntaxError> {
    let tokens = Tokenizer::tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };

    if parser.peek().kind == TokenKind::Eof {
        return Err(SyntaxError::Empty);
    }

    let (expr, _) = parser.expr()?;
    let trailing = parser.peek();
    match trailing.kind {
        TokenKind::Eof => Ok(expr),
        TokenKind::RParen => Err(SyntaxError::UnmatchedClose {
            offset: trailing.offset,
        }),
        _ => Err(parser.unexpected("an operator or end of input")),
    }
}

/// Subtree with its height
type Node = (Expr, usize);

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always ends with Eof, and Eof is never consumed
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if token.kind != TokenKind::Eof {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, expected: &'static str) -> SyntaxError {
        let token = self.peek();
        SyntaxError::UnexpectedToken {
            found: token.kind.to_string(),
            expected,
            offset: token.offset,
        }
    }

    fn enter(&mut self) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(SyntaxError::TooDeep {
                offset: self.peek().offset,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn grow(height: usize, offset: usize) -> Result<usize, SyntaxError> {
        let height = height + 1;
        if height > MAX_NESTING {
            return Err(SyntaxError::TooDeep { offset });
        }
        Ok(height)
    }

    fn expr(&mut self) -> Result<Node, SyntaxError> {
        self.enter()?;
        let (mut lhs, mut height) = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            let offset = self.bump().offset;
            let (rhs, rhs_height) = self.term()?;
            height = Self::grow(height.max(rhs_height), offset)?;
            lhs = Expr::binary(op, lhs, rhs);
        }
        self.leave();
        Ok((lhs, height))
    }

    fn term(&mut self) -> Result<Node, SyntaxError> {
        let (mut lhs, mut height) = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok((lhs, height)),
            };
            let offset = self.bump().offset;
            let (rhs, rhs_height) = self.unary()?;
            height = Self::grow(height.max(rhs_height), offset)?;
            lhs = Expr::binary(op, lhs, rhs);
        }
    }

    fn unary(&mut self) -> Result<Node, SyntaxError> {
        let sign = self.peek().kind.clone();
        if !matches!(sign, TokenKind::Minus | TokenKind::Plus) {
            return self.primary();
        }

        let offset = self.bump().offset;
        self.enter()?;
        let (inner, height) = self.unary()?;
        self.leave();
        if sign == TokenKind::Plus {
            return Ok((inner, height));
        }
        Ok((Expr::Neg(Box::new(inner)), Self::grow(height, offset)?))
    }

    fn primary(&mut self) -> Result<Node, SyntaxError> {
        let token = self.bump();
        match token.kind {
            TokenKind::Number(n) => Ok((Expr::Number(n), 1)),
            TokenKind::Shortcode(reference) => Ok((Expr::Shortcode(reference), 1)),
            TokenKind::LParen => {
                let inner = self.expr()?;
                self.close_paren(token.offset)?;
                Ok(inner)
            }
            TokenKind::Ident(name) => self.call(name, token.offset),
            TokenKind::RParen => Err(SyntaxError::UnmatchedClose {
                offset: token.offset,
            }),
            kind => Err(SyntaxError::UnexpectedToken {
                found: kind.to_string(),
                expected: "a number, shortcode, function or '('",
                offset: token.offset,
            }),
        }
    }

    fn call(&mut self, name: String, offset: usize) -> Result<Node, SyntaxError> {
        let function =
            Function::from_name(&name).ok_or(SyntaxError::UnknownFunction { name, offset })?;

        let open = self.peek().clone();
        if open.kind != TokenKind::LParen {
            return Err(self.unexpected("'(' after function name"));
        }
        self.bump();

        let mut args = Vec::new();
        let mut height = 0;
        if self.peek().kind != TokenKind::RParen {
            loop {
                let (arg, arg_height) = self.expr()?;
                height = height.max(arg_height);
                args.push(arg);
                if self.peek().kind == TokenKind::Comma {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.close_paren(open.offset)?;

        if !function.arity().contains(&args.len()) {
            return Err(SyntaxError::Arity {
                function: function.name(),
                expected: function.arity_label(),
                found: args.len(),
            });
        }

        Ok((Expr::Call { function, args }, Self::grow(height, offset)?))
    }

    fn close_paren(&mut self, open_offset: usize) -> Result<(), SyntaxError> {
        match self.peek().kind {
            TokenKind::RParen => {
                self.bump();
                Ok(())
            }
            TokenKind::Eof => Err(SyntaxError::UnclosedOpen {
                offset: open_offset,
            }),
            _ => Err(self.unexpected("')'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecalc_model::ShortcodeRef;
    use pretty_assertions::assert_eq;

    #[test]
    fn respects_precedence() {
        let expr = parse("2 + 3 * 4").unwrap();
        assert_eq!(
            expr,
            Expr::binary(
                BinaryOp::Add,
                Expr::Number(2.0),
                Expr::binary(BinaryOp::Mul, Expr::Number(3.0), Expr::Number(4.0)),
            )
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(parse("10 - 4 - 3").unwrap().to_string(), "10 - 4 - 3");
        assert_eq!(parse("10 - (4 - 3)").unwrap().to_string(), "10 - (4 - 3)");
    }

    #[test]
    fn canonical_display() {
        let expr = parse("(([field:current_consumption]-[field:new_consumption]))*[field:energy_price]").unwrap();
        assert_eq!(
            expr.to_string(),
            "([field:current_consumption] - [field:new_consumption]) * [field:energy_price]"
        );
        assert_eq!(parse("Math.round(-(1+2), 2)").unwrap().to_string(), "round(-(1 + 2), 2)");
    }

    #[test]
    fn collects_references() {
        let expr = parse("max([field:a], [calc:b]) + [field:a] / [lookup:c]").unwrap();
        let refs: Vec<_> = expr.references().into_iter().collect();
        assert_eq!(
            refs,
            vec![ShortcodeRef::field("a"), ShortcodeRef::calc("b"), ShortcodeRef::lookup("c")]
        );
    }

    #[test]
    fn reports_paren_errors() {
        assert_eq!(parse("(1 + 2"), Err(SyntaxError::UnclosedOpen { offset: 0 }));
        assert_eq!(parse("1 + 2)"), Err(SyntaxError::UnmatchedClose { offset: 5 }));
        assert_eq!(parse(")"), Err(SyntaxError::UnmatchedClose { offset: 0 }));
        assert_eq!(parse("round(1"), Err(SyntaxError::UnclosedOpen { offset: 5 }));
    }

    #[test]
    fn reports_grammar_errors() {
        assert_eq!(parse("   "), Err(SyntaxError::Empty));
        assert!(matches!(parse("1 +"), Err(SyntaxError::UnexpectedToken { .. })));
        assert!(matches!(parse("1 2"), Err(SyntaxError::UnexpectedToken { offset: 2, .. })));
        assert!(matches!(parse("area * 2"), Err(SyntaxError::UnknownFunction { .. })));
        assert!(matches!(parse("round 2"), Err(SyntaxError::UnexpectedToken { .. })));
    }

    #[test]
    fn checks_arity() {
        assert_eq!(
            parse("sqrt(1, 2)"),
            Err(SyntaxError::Arity {
                function: "sqrt",
                expected: "1".into(),
                found: 2
            })
        );
        assert!(matches!(parse("max()"), Err(SyntaxError::Arity { found: 0, .. })));
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let parens = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        assert!(matches!(parse(&parens), Err(SyntaxError::TooDeep { .. })));

        let signs = format!("{}1", "-".repeat(200_000));
        assert!(matches!(parse(&signs), Err(SyntaxError::TooDeep { .. })));

        let plus_signs = format!("{}1", "+".repeat(200_000));
        assert!(matches!(parse(&plus_signs), Err(SyntaxError::TooDeep { .. })));

        let calls = format!("{}1{}", "abs(".repeat(200_000), ")".repeat(200_000));
        assert!(matches!(parse(&calls), Err(SyntaxError::TooDeep { .. })));
    }

    #[test]
    fn long_operator_chains_are_bounded() {
        let chain = vec!["1"; 100_000].join(" + ");
        assert!(matches!(parse(&chain), Err(SyntaxError::TooDeep { .. })));

        let product = vec!["2"; 100_000].join(" * ");
        assert!(matches!(parse(&product), Err(SyntaxError::TooDeep { .. })));
    }

    #[test]
    fn nesting_up_to_the_limit_is_accepted() {
        let depth = MAX_NESTING - 1;
        let parens = format!("{}1{}", "(".repeat(depth), ")".repeat(depth));
        assert_eq!(parse(&parens), Ok(Expr::Number(1.0)));

        let chain = vec!["1"; 100].join(" + ");
        assert!(parse(&chain).is_ok());
    }
}
