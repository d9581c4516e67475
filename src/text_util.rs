/// Build a single-line preview of `content`, at most `max_chars`
/// characters long.
///
/// Line breaks and runs of whitespace collapse to a single space.
pub fn make_snippet(content: &str, max_chars: usize) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&collapsed, max_chars).to_string()
}

/// Cut `text` to at most `max_chars` characters without splitting a
/// multi-byte character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_collapses_whitespace() {
        assert_eq!(
            make_snippet("  first line\nsecond\t\tline  ", 100),
            "first line second line"
        );
    }

    #[test]
    fn snippet_respects_limit() {
        let text = "a".repeat(500);
        assert_eq!(make_snippet(&text, 320).len(), 320);
    }

    #[test]
    fn truncate_keeps_char_boundaries() {
        assert_eq!(truncate_chars("café au lait", 4), "café");
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("", 3), "");
    }
}
