//! Cleaning of user-supplied form input before it reaches storage.

use std::collections::HashSet;

const ENTITIES: [(&str, char); 5] = [
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
    ("&#39;", '\''),
];

/// Escapes text so it can be placed into HTML as text content.
///
/// Applying it twice escapes the ampersands produced by the first pass, so
/// callers sanitize exactly once, on the way into storage.
pub fn sanitize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Reverses one pass of [`sanitize_text`]. Other entities are left alone.
pub fn unescape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match ENTITIES.iter().find(|(entity, _)| rest.starts_with(entity)) {
            Some((entity, ch)) => {
                out.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Parses a numeric reading out of free text.
///
/// Everything except ASCII digits and `.` is dropped first, which also drops
/// a leading minus sign. The longest leading decimal literal of what is left
/// is parsed, so `"1.2.3"` reads as `1.2`. Returns `None` when no digit
/// survives.
pub fn parse_number(input: &str) -> Option<f64> {
    let stripped: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let mut seen_dot = false;
    let literal_len = stripped
        .char_indices()
        .find(|&(_, c)| {
            if c == '.' {
                if seen_dot {
                    return true;
                }
                seen_dot = true;
            }
            false
        })
        .map(|(idx, _)| idx)
        .unwrap_or(stripped.len());
    let literal = &stripped[..literal_len];

    if !literal.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    literal.parse().ok()
}

/// Like [`parse_number`], falling back to `0` for unreadable input.
pub fn sanitize_number(input: &str) -> f64 {
    parse_number(input).unwrap_or(0.0)
}

/// Splits text into the lowercase alphanumeric words used by the
/// description index. Duplicates are dropped, first occurrence wins.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for word in input.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        let word = word.to_lowercase();
        if seen.insert(word.clone()) {
            tokens.push(word);
        }
    }
    tokens
}
