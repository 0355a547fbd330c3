//! Markdown code-fence removal for model replies

use regex::Regex;
use std::sync::OnceLock;

fn opening_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A tag must end its line; only a bare "json" may be glued to the payload
    RE.get_or_init(|| {
        Regex::new(r"(?i)\A```(?:[a-z0-9_+.-]+[ \t]*\r?\n|json\b)?\s*")
            .expect("valid opening fence regex")
    })
}

fn closing_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s*```\z").expect("valid closing fence regex"))
}

/// Remove a Markdown code fence wrapped around a reply.
///
/// Only a fence at the very start and/or the very end is removed; backticks
/// inside the payload are left alone. Nested fences are peeled until none
/// remain, so applying the function twice gives the same result as once.
pub fn strip_code_fences(reply: &str) -> &str {
    let mut current = reply.trim();
    loop {
        let stripped = strip_outer_fence(current);
        if stripped.len() == current.len() {
            return stripped;
        }
        current = stripped;
    }
}

fn strip_outer_fence(trimmed: &str) -> &str {
    let start = opening_fence()
        .find(trimmed)
        .map(|m| m.end())
        .unwrap_or(0);
    let body = &trimmed[start..];
    let end = closing_fence()
        .find(body)
        .map(|m| m.start())
        .unwrap_or(body.len());
    body[..end].trim()
}
