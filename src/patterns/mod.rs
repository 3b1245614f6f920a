//! Textual pattern matching over configuration files
//!
//! Architectural Principle: Service Layer - one predicate decides whether a declaration is active
//! - Patterns are either literal substrings or regular expressions
//! - Comment detection is a line scan parameterised by the comment marker
//! - No syntax tree is built; a commented-out declaration is indistinguishable from an absent one

use crate::domain::checks::{CheckerError, CheckerResult};
use regex::{Regex, RegexBuilder};
use std::fmt;

/// Comment marker used by Terraform/HCL files
pub const DEFAULT_COMMENT_MARKER: &str = "#";

/// A compiled pattern
#[derive(Debug, Clone)]
pub enum Pattern {
    /// Plain substring match
    Literal(String),
    /// Regular expression search with multi-line and dot-all semantics
    Regex(Regex),
}

impl Pattern {
    pub fn literal(pattern: impl Into<String>) -> Self {
        Self::Literal(pattern.into())
    }

    /// Compile a regex pattern
    pub fn regex(pattern: &str) -> CheckerResult<Self> {
        RegexBuilder::new(pattern)
            .multi_line(true)
            .dot_matches_new_line(true)
            .build()
            .map(Self::Regex)
            .map_err(|e| CheckerError::pattern(format!("Invalid regex '{pattern}': {e}")))
    }

    /// Compile from a configuration value
    pub fn compile(pattern: &str, is_regex: bool) -> CheckerResult<Self> {
        if is_regex {
            Self::regex(pattern)
        } else {
            Ok(Self::literal(pattern))
        }
    }

    /// Whether the pattern occurs anywhere in the text
    pub fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Literal(literal) => text.contains(literal.as_str()),
            Self::Regex(regex) => regex.is_match(text),
        }
    }

    /// Source text of the pattern
    pub fn as_str(&self) -> &str {
        match self {
            Self::Literal(literal) => literal,
            Self::Regex(regex) => regex.as_str(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a pattern was found in a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Not in the file at all (or the file is missing)
    Absent,
    /// Only on comment lines
    CommentedOut,
    /// On at least one non-comment, non-blank line
    Active,
}

/// Whether `pattern` occurs on at least one line that is neither blank nor a comment
///
/// Lines are trimmed before the comment test, so indented comments are skipped too.
pub fn occurs_uncommented(content: &str, pattern: &Pattern, comment_marker: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with(comment_marker))
        .any(|line| pattern.is_match(line))
}

/// Classify a pattern as absent, commented out or active within the content
pub fn presence(content: Option<&str>, pattern: &Pattern, comment_marker: &str) -> Presence {
    match content {
        None => Presence::Absent,
        Some(text) if occurs_uncommented(text, pattern, comment_marker) => Presence::Active,
        Some(text) if pattern.is_match(text) => Presence::CommentedOut,
        Some(_) => Presence::Absent,
    }
}
