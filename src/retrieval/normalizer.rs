//! Query text normalization
//!
//! Lowercases, splits on non-word characters and drops stop-words and
//! single-character tokens. Used only to build the text sent to the
//! embedding model at query time.

use std::collections::HashSet;
use std::sync::LazyLock;

/// English stop-words removed before embedding a query
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any", "are",
    "aren", "as", "at", "be", "because", "been", "before", "being", "below", "between", "both",
    "but", "by", "can", "could", "couldn", "did", "didn", "do", "does", "doesn", "doing", "don",
    "down", "during", "each", "few", "for", "from", "further", "had", "hadn", "has", "hasn",
    "have", "haven", "having", "he", "her", "here", "hers", "herself", "him", "himself", "his",
    "how", "i", "if", "in", "into", "is", "isn", "it", "its", "itself", "just", "ll", "me",
    "might", "more", "most", "must", "my", "myself", "no", "nor", "not", "now", "of", "off",
    "on", "once", "only", "or", "other", "our", "ours", "ourselves", "out", "over", "own", "re",
    "same", "shall", "she", "should", "shouldn", "so", "some", "such", "than", "that", "the",
    "their", "theirs", "them", "themselves", "then", "there", "these", "they", "this", "those",
    "through", "to", "too", "under", "until", "up", "ve", "very", "was", "wasn", "we", "were",
    "weren", "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with",
    "won", "would", "wouldn", "you", "your", "yours", "yourself", "yourselves",
];

static STOP_WORD_SET: LazyLock<HashSet<&'static str>> =
    LazyLock::new(|| STOP_WORDS.iter().copied().collect());

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split text into lowercase content tokens, preserving order
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !is_word_char(c))
        .filter(|w| w.chars().count() > 1)
        .filter(|w| !STOP_WORD_SET.contains(w))
        .map(str::to_string)
        .collect()
}

/// Normalize free text into a space-separated token string.
///
/// Total and idempotent: `normalize(normalize(x)) == normalize(x)`, and empty
/// input yields an empty string.
pub fn normalize(text: &str) -> String {
    tokenize(text).join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_drops_stop_words() {
        assert_eq!(
            normalize("The Best Professor For Algorithms"),
            "best professor algorithms"
        );
    }

    #[test]
    fn test_normalize_splits_on_punctuation() {
        assert_eq!(
            normalize("Who's teaching CS-101?? (Fall '24)"),
            "teaching cs 101 fall 24"
        );
    }

    #[test]
    fn test_normalize_drops_single_chars() {
        assert_eq!(normalize("a b c calculus"), "calculus");
    }

    #[test]
    fn test_normalize_empty() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   \t\n"), "");
        assert_eq!(normalize("the of and"), "");
    }

    #[test]
    fn test_normalize_idempotent() {
        let inputs = [
            "The Best Professor For Algorithms",
            "Is Dr. Müller's   LINEAR-algebra class hard?",
            "snake_case_identifiers and CamelCase",
            "Ünïcödé ÄÖÜ straße",
            "",
            "!!!",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_stop_word_list_size() {
        assert!((140..=160).contains(&STOP_WORD_SET.len()));
    }
}
