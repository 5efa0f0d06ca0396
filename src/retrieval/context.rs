//! Renders retrieved matches into the text block that grounds a prompt

use std::fmt::Write;

use crate::core::Match;

/// Context returned when nothing was retrieved
pub const NO_CONTEXT: &str = "No relevant professor information found.";

/// Default per-review character cap
pub const DEFAULT_MAX_REVIEW_CHARS: usize = 1000;

/// Formats matches as numbered blocks, in the order given
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_review_chars: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        ContextAssembler::new(DEFAULT_MAX_REVIEW_CHARS)
    }
}

impl ContextAssembler {
    pub fn new(max_review_chars: usize) -> Self {
        ContextAssembler { max_review_chars }
    }

    /// Render `matches`; never returns an empty string
    pub fn assemble(&self, matches: &[Match]) -> String {
        if matches.is_empty() {
            return NO_CONTEXT.to_string();
        }

        let mut out = String::new();
        for (i, m) in matches.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            let review = &m.review;
            // Writing to a String cannot fail
            let _ = writeln!(out, "Review {}:", i + 1);
            let _ = writeln!(out, "Professor: {}", review.professor);
            let _ = writeln!(out, "University: {}", review.university);
            let _ = writeln!(out, "Subject: {}", review.subject);
            let _ = writeln!(out, "Review: {}", truncate(&review.text, self.max_review_chars));
            let _ = writeln!(out, "Stars: {}/5", review.stars);
            let _ = writeln!(out, "Similarity: {:.2}", m.score);
        }
        out
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", text[..cut].trim_end()),
        None => text.to_string(),
    }
}
