//! Helpers for handling untrusted completion replies.

use regex::Regex;
use std::sync::LazyLock;

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[a-zA-Z0-9_+-]*\n?(.*?)\n?```").expect("fence pattern is valid")
});

/// Return the body of the first markdown code fence, or the trimmed text
/// when there is none.
pub fn strip_markdown_fences(text: &str) -> &str {
    FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| text.trim(), |body| body.as_str().trim())
}

/// First `max_chars` characters of `text`, never splitting a character.
pub fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fenced_json() {
        let reply = "Here you go:\n```json\n{\"a\": 1}\n```\nthanks";
        assert_eq!(strip_markdown_fences(reply), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_without_fence() {
        assert_eq!(strip_markdown_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo", 2), "hé");
        assert_eq!(excerpt("abc", 10), "abc");
        assert_eq!(excerpt("", 3), "");
    }
}
