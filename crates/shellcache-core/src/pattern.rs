//! URL pattern matching
//!
//! Patterns are either literal substrings or regular expressions. Matching
//! never fails: a URL that cannot match simply returns false.

use regex::{Regex, RegexBuilder};
use std::fmt;

use crate::error::CoreError;

/// Upper bound on the compiled size of a configured regex
const MAX_REGEX_SIZE: usize = 1 << 20;

/// A single URL pattern
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Matches when the URL contains the text
    Literal(String),
    /// Matches when the expression finds a match anywhere in the URL
    Regex(Regex),
}

impl Pattern {
    pub fn literal(text: impl Into<String>) -> Self {
        Pattern::Literal(text.into())
    }

    /// Compile a regular expression pattern
    pub fn regex(expr: &str) -> Result<Self, CoreError> {
        RegexBuilder::new(expr)
            .size_limit(MAX_REGEX_SIZE)
            .build()
            .map(Pattern::Regex)
            .map_err(|e| CoreError::InvalidPattern(format!("{}: {}", expr, e)))
    }

    pub fn is_match(&self, url: &str) -> bool {
        match self {
            Pattern::Literal(text) => url.contains(text.as_str()),
            Pattern::Regex(re) => re.is_match(url),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Literal(text) => text,
            Pattern::Regex(re) => re.as_str(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Literal(text) => write!(f, "{:?}", text),
            Pattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Whether the URL matches any of the patterns
pub fn matches(url: &str, patterns: &[Pattern]) -> bool {
    first_match(url, patterns).is_some()
}

/// The first pattern matching the URL, in list order
pub fn first_match<'a>(url: &str, patterns: &'a [Pattern]) -> Option<&'a Pattern> {
    patterns.iter().find(|p| p.is_match(url))
}
