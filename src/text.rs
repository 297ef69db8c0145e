//! Text helpers shared by the classifiers, store and reply sanitizer.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").unwrap());

/// Trimmed, lowercased form used for matching
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Cut to at most `max` characters (UTF-8 safe, hard cut)
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Replace every run of two or more whitespace characters with one space
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").into_owned()
}

/// "maria DA silva" -> "Maria Da Silva"
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a  b\n\n c"), "a b c");
        assert_eq!(collapse_whitespace("a b"), "a b");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("maria DA silva"), "Maria Da Silva");
        assert_eq!(title_case("  joão  "), "João");
    }
}
