//! Structured-output helpers for free-text model answers.
//!
//! Model output is untrusted: everything here either yields a well-formed
//! value or fails with [`KgragError::Parse`]. Nothing is ever evaluated.

use crate::error::{KgragError, Result};

/// Drop a surrounding markdown code fence, if any.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        // skip the info string ("json", "python", ...)
        let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        return body.trim_end().strip_suffix("```").unwrap_or(body).trim();
    }
    trimmed
}

/// Take the outermost `{...}` of a model answer and parse it as JSON.
pub fn extract_json_object(text: &str) -> Result<serde_json::Value> {
    let body = strip_code_fence(text);
    let (start, end) = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => return Err(KgragError::Parse(format!("no JSON object in model output: {}", preview(text)))),
    };
    let value: serde_json::Value = serde_json::from_str(&body[start..=end])
        .map_err(|e| KgragError::Parse(format!("invalid JSON object: {}", e)))?;
    if !value.is_object() {
        return Err(KgragError::Parse("JSON value is not an object".to_string()));
    }
    Ok(value)
}

/// Locate the outermost `[...]` of a model answer.
pub fn find_list_literal(text: &str) -> Result<&str> {
    let body = strip_code_fence(text);
    match (body.find('['), body.rfind(']')) {
        (Some(start), Some(end)) if start < end => Ok(&body[start..=end]),
        _ => Err(KgragError::Parse(format!("no list literal in model output: {}", preview(text)))),
    }
}

/// Parse a strict list-of-strings literal: `['a', "b",]`.
///
/// Elements are single- or double-quoted strings with backslash escapes; a
/// trailing comma is allowed; the list must span the whole input (surrounding
/// whitespace aside). Anything else is rejected.
pub fn parse_string_list(text: &str) -> Result<Vec<String>> {
    let mut parser = ListParser {
        chars: text.trim().chars().peekable(),
    };
    let items = parser.list()?;
    if parser.chars.next().is_some() {
        return Err(parse_err("trailing characters after list"));
    }
    Ok(items)
}

/// Render strings as a list literal that [`parse_string_list`] accepts.
pub fn render_string_list<S: AsRef<str>>(items: &[S]) -> String {
    let quoted: Vec<String> = items
        .iter()
        .map(|s| format!("'{}'", s.as_ref().replace('\\', "\\\\").replace('\'', "\\'")))
        .collect();
    format!("[{}]", quoted.join(", "))
}

fn parse_err(msg: &str) -> KgragError {
    KgragError::Parse(format!("malformed list literal: {}", msg))
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}

struct ListParser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl ListParser<'_> {
    fn skip_ws(&mut self) {
        while self.chars.next_if(|c| c.is_whitespace()).is_some() {}
    }

    fn list(&mut self) -> Result<Vec<String>> {
        if self.chars.next() != Some('[') {
            return Err(parse_err("expected '['"));
        }
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.chars.peek() {
                Some(']') => {
                    self.chars.next();
                    return Ok(items);
                }
                Some('\'') | Some('"') => items.push(self.string()?),
                _ => return Err(parse_err("expected string or ']'")),
            }
            self.skip_ws();
            match self.chars.next() {
                Some(',') => continue,
                Some(']') => return Ok(items),
                _ => return Err(parse_err("expected ',' or ']'")),
            }
        }
    }

    fn string(&mut self) -> Result<String> {
        let quote = self.chars.next().ok_or_else(|| parse_err("unexpected end"))?;
        let mut out = String::new();
        loop {
            match self.chars.next() {
                None => return Err(parse_err("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('u') => out.push(self.unicode_escape()?),
                    Some(c) => out.push(c),
                    None => return Err(parse_err("dangling escape")),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char> {
        let hex: String = (0..4).filter_map(|_| self.chars.next()).collect();
        if hex.len() != 4 {
            return Err(parse_err("short unicode escape"));
        }
        u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .ok_or_else(|| parse_err("invalid unicode escape"))
    }
}
