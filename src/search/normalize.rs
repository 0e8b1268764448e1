//! Lexical query normalization.
//!
//! Turns free text into a full-text-safe query: characters reserved by the
//! Lucene-style query syntax are replaced by spaces, the `^` importance marker
//! is left alone, and the remainder collapses to single-space-joined tokens.

/// Characters stripped from queries. `^` is deliberately absent.
pub const RESERVED_CHARS: &[char] = &[
    '+', '&', '|', '!', '(', ')', '{', '}', '[', ']', '"', '~', '*', '?', ':', '\\',
];

/// Normalize raw text into a search-engine-safe query.
///
/// An empty return value means there is nothing searchable; callers must not
/// issue a query for it.
pub fn normalize_query(text: &str) -> String {
    text.chars()
        .map(|c| if RESERVED_CHARS.contains(&c) { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A single query term with its boost (`term^N`, default 1).
#[derive(Debug, Clone, PartialEq)]
pub struct BoostedTerm {
    pub term: String,
    pub boost: f32,
}

/// Split a trailing `^N` marker off `token`.
///
/// Returns `(text, Some(n))` only when the suffix parses as a positive finite
/// number; otherwise `(token, None)`.
pub fn split_importance(token: &str) -> (&str, Option<f32>) {
    if let Some(idx) = token.rfind('^') {
        let (head, tail) = token.split_at(idx);
        if let Ok(value) = tail[1..].trim().parse::<f32>() {
            if value.is_finite() && value > 0.0 && !head.trim().is_empty() {
                return (head.trim_end(), Some(value));
            }
        }
    }
    (token, None)
}

/// Parse a normalized query into boosted terms.
///
/// Stray `^` characters that do not form a valid marker are dropped from the
/// term text; terms left empty are skipped.
pub fn parse_boosted_terms(normalized: &str) -> Vec<BoostedTerm> {
    normalized
        .split_whitespace()
        .filter_map(|token| {
            let (text, boost) = split_importance(token);
            let term: String = text.chars().filter(|c| *c != '^').collect();
            if term.is_empty() {
                return None;
            }
            Some(BoostedTerm {
                term,
                boost: boost.unwrap_or(1.0),
            })
        })
        .collect()
}

fn is_cjk(c: char) -> bool {
    matches!(
        c,
        '\u{3040}'..='\u{30FF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{F900}'..='\u{FAFF}'
            | '\u{20000}'..='\u{2FA1F}'
    )
}

/// Put every Han or kana character in a token of its own, the way Lucene's
/// standard analyzer splits CJK runs, and collapse whitespace.
pub fn segment_cjk(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        if is_cjk(c) {
            out.push(' ');
            out.push(c);
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
