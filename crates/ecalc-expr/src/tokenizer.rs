//! Expression tokenizer
//!
//! Turns formula text into tokens with byte offsets. Anything outside the
//! whitelist (numbers, shortcodes, identifiers, `+ - * / ( ) ,`, whitespace)
//! is rejected here, before the parser sees it.

use std::fmt::{self, Display, Formatter};

use ecalc_model::ShortcodeRef;

use crate::error::SyntaxError;
use crate::shortcode;

/// Token kinds
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Numeric literal
    Number(f64),
    /// `[kind:name]`
    Shortcode(ShortcodeRef),
    /// Function name (may contain `.`, e.g. `Math.round`)
    Ident(String),
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Star,
    /// `/`
    Slash,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// `,`
    Comma,
    /// End of input
    Eof,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "number {n}"),
            Self::Shortcode(r) => write!(f, "shortcode {r}"),
            Self::Ident(name) => write!(f, "identifier '{name}'"),
            Self::Plus => f.write_str("'+'"),
            Self::Minus => f.write_str("'-'"),
            Self::Star => f.write_str("'*'"),
            Self::Slash => f.write_str("'/'"),
            Self::LParen => f.write_str("'('"),
            Self::RParen => f.write_str("')'"),
            Self::Comma => f.write_str("','"),
            Self::Eof => f.write_str("end of input"),
        }
    }
}

/// Token with its starting byte offset
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Kind
    pub kind: TokenKind,
    /// Byte offset in the source text
    pub offset: usize,
}

/// Tokenizer over formula text
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    /// Create tokenizer at the start of `input`
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Tokenize entire input, ending with [`TokenKind::Eof`]
    ///
    /// # Errors
    /// Returns the first lexical error
    pub fn tokenize(input: &str) -> Result<Vec<Token>, SyntaxError> {
        let mut tokenizer = Tokenizer::new(input);
        let mut tokens = Vec::new();
        loop {
            let token = tokenizer.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    /// Next token
    ///
    /// # Errors
    /// Returns error on characters outside the whitelist, bad numbers or
    /// malformed shortcodes
    pub fn next_token(&mut self) -> Result<Token, SyntaxError> {
        self.skip_whitespace();
        let start = self.pos;

        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                offset: start,
            });
        };

        let kind = match c {
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Star),
            '/' => self.single(TokenKind::Slash),
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            ',' => self.single(TokenKind::Comma),
            '[' => {
                let (reference, end) = shortcode::parse_at(self.input, start)?;
                self.pos = end;
                TokenKind::Shortcode(reference)
            }
            c if c.is_ascii_digit() || c == '.' => self.read_number(start)?,
            c if c.is_ascii_alphabetic() || c == '_' => self.read_ident(),
            ch => return Err(SyntaxError::UnexpectedChar { ch, offset: start }),
        };

        Ok(Token { kind, offset: start })
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_at(&self, ahead: usize) -> Option<char> {
        self.input[self.pos..].chars().nth(ahead)
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    fn eat_digits(&mut self) -> usize {
        let mut count = 0;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            count += 1;
        }
        count
    }

    fn read_number(&mut self, start: usize) -> Result<TokenKind, SyntaxError> {
        let mut digits = self.eat_digits();

        if self.peek() == Some('.') {
            self.advance();
            digits += self.eat_digits();
        }

        // Exponent only when followed by digits, so `2e` stays an error below
        if matches!(self.peek(), Some('e' | 'E')) {
            let signed = matches!(self.peek_at(1), Some('+' | '-'));
            let digit_at = if signed { 2 } else { 1 };
            if self.peek_at(digit_at).is_some_and(|c| c.is_ascii_digit()) {
                for _ in 0..digit_at {
                    self.advance();
                }
                self.eat_digits();
            }
        }

        // A literal running straight into a name (`2x`, `3.5.1`) is malformed
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
        {
            self.advance();
        }

        let text = &self.input[start..self.pos];
        if digits == 0 {
            return Err(SyntaxError::InvalidNumber {
                text: text.to_string(),
                offset: start,
            });
        }
        text.parse::<f64>()
            .map(TokenKind::Number)
            .map_err(|_| SyntaxError::InvalidNumber {
                text: text.to_string(),
                offset: start,
            })
    }

    fn read_ident(&mut self) -> TokenKind {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            self.advance();
        }
        TokenKind::Ident(self.input[start..self.pos].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<TokenKind> {
        Tokenizer::tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn tokenizes_arithmetic() {
        assert_eq!(
            kinds("(2 + 3.5) * .5 / 1e3"),
            vec![
                TokenKind::LParen,
                TokenKind::Number(2.0),
                TokenKind::Plus,
                TokenKind::Number(3.5),
                TokenKind::RParen,
                TokenKind::Star,
                TokenKind::Number(0.5),
                TokenKind::Slash,
                TokenKind::Number(1000.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_shortcodes_and_functions() {
        assert_eq!(
            kinds("Math.round([field:a] - [calc:b-c], 2)"),
            vec![
                TokenKind::Ident("Math.round".into()),
                TokenKind::LParen,
                TokenKind::Shortcode(ShortcodeRef::field("a")),
                TokenKind::Minus,
                TokenKind::Shortcode(ShortcodeRef::calc("b-c")),
                TokenKind::Comma,
                TokenKind::Number(2.0),
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn offsets_point_at_token_start() {
        let tokens = Tokenizer::tokenize("1 +  [field:x]").unwrap();
        let offsets: Vec<_> = tokens.iter().map(|t| t.offset).collect();
        assert_eq!(offsets, vec![0, 2, 5, 14]);
    }

    #[test]
    fn rejects_characters_outside_whitelist() {
        assert_eq!(
            Tokenizer::tokenize("1 ; 2"),
            Err(SyntaxError::UnexpectedChar { ch: ';', offset: 2 })
        );
        assert!(matches!(
            Tokenizer::tokenize("\"quoted\""),
            Err(SyntaxError::UnexpectedChar { ch: '"', .. })
        ));
    }

    #[test]
    fn rejects_malformed_numbers() {
        assert!(matches!(Tokenizer::tokenize("2x"), Err(SyntaxError::InvalidNumber { .. })));
        assert!(matches!(Tokenizer::tokenize("1.2.3"), Err(SyntaxError::InvalidNumber { .. })));
        assert!(matches!(Tokenizer::tokenize("."), Err(SyntaxError::InvalidNumber { .. })));
    }
}
