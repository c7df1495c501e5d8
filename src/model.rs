//! Typed view over the engine's annotated output.

use std::sync::OnceLock;

use regex::Regex;

/// One segmented word with its part-of-speech tag.
///
/// Produced by [`parse_terms`] from the space-separated `form/tag` text the
/// engine emits when annotation is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Term {
    /// Surface form.
    pub form: String,
    /// Part-of-speech tag (`n`, `vd`, `nr2`, ...). Empty when the engine
    /// emits a bare trailing slash.
    pub tag: String,
}

impl Term {
    /// Creates a term from its parts.
    pub fn new(form: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            form: form.into(),
            tag: tag.into(),
        }
    }

    /// Coarse tag family: the first character of the tag (`n` covers all
    /// noun subtags, `v` verbs, `w` punctuation, and so on).
    pub fn tag_class(&self) -> Option<char> {
        self.tag.chars().next()
    }
}

/// Splits annotated engine output into typed terms.
///
/// Terms are separated by spaces and annotated as `form/tag`. The tag
/// follows the last slash, so forms containing `/` survive. Tokens without
/// an annotation are skipped.
pub fn parse_terms(annotated: &str) -> Vec<Term> {
    let pattern = term_pattern();
    annotated
        .split_whitespace()
        .filter_map(|token| pattern.captures(token))
        .map(|captures| Term::new(&captures[1], &captures[2]))
        .collect()
}

fn term_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(.+)/(\w*)$").expect("term pattern is valid"))
}
