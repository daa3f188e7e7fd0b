//! Shortcode token grammar
//!
//! `[` kind `:` name `]`, where kind is `field`, `calc` or `lookup` and the
//! name follows [`ecalc_model::is_valid_name`]. The tokenizer and the text
//! scanner both go through [`parse_at`], so every consumer recognises the
//! same set of references.

use ecalc_model::{is_valid_name, ShortcodeKind, ShortcodeRef};

use crate::error::{ShortcodeIssue, SyntaxError};

/// A shortcode found in text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortcodeMatch {
    /// The reference
    pub reference: ShortcodeRef,
    /// Byte offset of `[`
    pub start: usize,
    /// Byte offset one past `]`
    pub end: usize,
}

/// Parse the shortcode starting at `start`
///
/// `input[start..]` must begin with `[`. On success returns the reference
/// and the byte offset one past the closing `]`.
///
/// # Errors
/// Returns [`SyntaxError::MalformedShortcode`] describing the defect
pub fn parse_at(input: &str, start: usize) -> Result<(ShortcodeRef, usize), SyntaxError> {
    debug_assert!(input[start..].starts_with('['));
    let body_start = start + 1;
    let rest = &input[body_start..];

    let malformed = |end: usize, issue: ShortcodeIssue| SyntaxError::MalformedShortcode {
        text: input[start..end].to_string(),
        offset: start,
        issue,
    };

    let close = match rest.find(&['[', ']'][..]) {
        Some(idx) if rest[idx..].starts_with(']') => idx,
        Some(idx) => return Err(malformed(body_start + idx, ShortcodeIssue::Unterminated)),
        None => return Err(malformed(input.len(), ShortcodeIssue::Unterminated)),
    };
    let end = body_start + close + 1;
    let body = &rest[..close];

    let Some((kind, name)) = body.split_once(':') else {
        return Err(malformed(end, ShortcodeIssue::MissingColon));
    };
    let kind: ShortcodeKind = kind
        .parse()
        .map_err(|_| malformed(end, ShortcodeIssue::UnknownKind(kind.to_string())))?;
    if !is_valid_name(name) {
        return Err(malformed(end, ShortcodeIssue::InvalidName(name.to_string())));
    }

    Ok((ShortcodeRef::new(kind, name), end))
}

/// Scan free text for shortcodes
///
/// Every `[` starts a candidate; malformed candidates are reported in place
/// and scanning resumes after them.
#[must_use]
pub fn scan(text: &str) -> Vec<Result<ShortcodeMatch, SyntaxError>> {
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(idx) = text[pos..].find('[') {
        let start = pos + idx;
        match parse_at(text, start) {
            Ok((reference, end)) => {
                out.push(Ok(ShortcodeMatch { reference, start, end }));
                pos = end;
            }
            Err(err) => {
                pos = match &err {
                    SyntaxError::MalformedShortcode { text: t, .. } => start + t.len().max(1),
                    _ => start + 1,
                };
                out.push(Err(err));
            }
        }
    }
    out
}

/// Well-formed references in `text`, in order of appearance
#[must_use]
pub fn references(text: &str) -> Vec<ShortcodeRef> {
    scan(text)
        .into_iter()
        .filter_map(Result::ok)
        .map(|m| m.reference)
        .collect()
}
