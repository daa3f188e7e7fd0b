//! Template classification
//!
//! A template is arithmetic when every token is part of the expression
//! alphabet and every identifier names a whitelisted function. Anything
//! else (prose, currency signs, unknown words) is a text template whose
//! shortcodes are substituted in place. Malformed shortcodes are an error
//! either way.

use ecalc_expr::{scan, Function, SyntaxError, Token, TokenKind, Tokenizer};

/// How a template is resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Parse and evaluate
    Arithmetic,
    /// Substitute shortcodes into the text
    Text,
}

/// Decide how `template` is resolved
///
/// # Errors
/// Returns the first malformed shortcode in the template
pub fn classify(template: &str) -> Result<TemplateKind, SyntaxError> {
    let mut tokenizer = Tokenizer::new(template);
    loop {
        match tokenizer.next_token() {
            Ok(Token {
                kind: TokenKind::Eof, ..
            }) => return Ok(TemplateKind::Arithmetic),
            Ok(Token {
                kind: TokenKind::Ident(name),
                ..
            }) if Function::from_name(&name).is_none() => return text_or_malformed(template),
            Ok(_) => {}
            Err(err @ SyntaxError::MalformedShortcode { .. }) => return Err(err),
            Err(_) => return text_or_malformed(template),
        }
    }
}

fn text_or_malformed(template: &str) -> Result<TemplateKind, SyntaxError> {
    match scan(template).into_iter().find_map(Result::err) {
        Some(err) => Err(err),
        None => Ok(TemplateKind::Text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic_templates() {
        assert_eq!(classify("2 + 3 * 4"), Ok(TemplateKind::Arithmetic));
        assert_eq!(classify("Math.round([calc:x])"), Ok(TemplateKind::Arithmetic));
        // Still arithmetic, the parser reports the error
        assert_eq!(classify("round(2"), Ok(TemplateKind::Arithmetic));
        assert_eq!(classify(""), Ok(TemplateKind::Arithmetic));
    }

    #[test]
    fn text_templates() {
        assert_eq!(classify("Savings: [calc:annual_savings] €"), Ok(TemplateKind::Text));
        assert_eq!(classify("oil"), Ok(TemplateKind::Text));
        assert_eq!(classify("You save [calc:x] per year"), Ok(TemplateKind::Text));
    }

    #[test]
    fn malformed_shortcodes_fail_in_both_modes() {
        assert!(classify("1 + [calc:]").is_err());
        assert!(classify("Total: € [calc:x").is_err());
    }
}
