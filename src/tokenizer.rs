//! Text tokenizer shared by ingestion and querying.
//!
//! Text is lowercased, then NFC-normalized, and split on every character
//! that is neither a letter nor a combining mark. Composed letters such as
//! `é` stay intact, so `"Café"` becomes `"café"` rather than `"cafe"`, and
//! marks that lowercasing leaves uncomposed (the dot of `İ`) stay in their
//! word. Stop words are removed after splitting.

use std::{collections::HashSet, sync::LazyLock};

use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from",
        "has", "have", "he", "her", "his", "if", "in", "into", "is", "it",
        "its", "of", "on", "or", "she", "such", "that", "the", "their",
        "then", "there", "these", "they", "this", "to", "was", "were", "will",
        "with",
    ]
    .into_iter()
    .collect()
});

/// Returns `true` if `term` is dropped by [`tokenize`].
pub fn is_stop_word(term: &str) -> bool {
    STOP_WORDS.contains(term)
}

fn is_word_char(c: char) -> bool {
    c.is_alphabetic() || is_combining_mark(c)
}

/// Split `text` into normalized index terms, preserving input order.
///
/// # Examples
///
/// ```
/// use roadview::tokenizer::tokenize;
///
/// assert_eq!(tokenize("The café is OPEN"), vec!["café", "open"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    // Lowercasing can decompose (`İ` becomes `i` + U+0307), so NFC runs last.
    let normalized: String =
        text.chars().flat_map(char::to_lowercase).nfc().collect();

    normalized
        .split(|c: char| !is_word_char(c))
        .filter(|token| {
            token.chars().any(char::is_alphabetic) && !is_stop_word(token)
        })
        .map(str::to_string)
        .collect()
}
