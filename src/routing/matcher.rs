//! Path pattern matching.
//!
//! # Responsibilities
//! - Parse origin path globs once at load time
//! - Match request paths (case-sensitive, anchored at the start)
//!
//! # Design Decisions
//! - Only a trailing `*` is supported; it matches the remainder of the path
//! - `/dir/*` also matches `/dir` itself, but never `/directory`
//! - No regex to guarantee O(n) matching

use thiserror::Error;

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Reasons a path pattern is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("empty path pattern")]
    Empty,
    #[error("path pattern {0:?} must start with '/'")]
    NotAbsolute(String),
    #[error("path pattern {0:?} may only use '*' as its last character")]
    InteriorWildcard(String),
}

/// A compiled path glob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPattern {
    /// `*` on its own.
    Any,
    /// No wildcard: the path must be identical.
    Exact(String),
    /// Trailing wildcard: the path must start with the prefix.
    Prefix(String),
}

impl PathPattern {
    /// Compile a glob such as `/public/*`, `/img*` or `/robots.txt`.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if raw.is_empty() {
            return Err(PatternError::Empty);
        }
        if raw == "*" {
            return Ok(PathPattern::Any);
        }
        if !raw.starts_with('/') {
            return Err(PatternError::NotAbsolute(raw.to_string()));
        }

        match raw.find('*') {
            None => Ok(PathPattern::Exact(raw.to_string())),
            Some(pos) if pos == raw.len() - 1 => Ok(PathPattern::Prefix(raw[..pos].to_string())),
            Some(_) => Err(PatternError::InteriorWildcard(raw.to_string())),
        }
    }
}

impl Matcher for PathPattern {
    fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Any => true,
            PathPattern::Exact(expected) => path == expected,
            PathPattern::Prefix(prefix) => {
                if path.starts_with(prefix.as_str()) {
                    return true;
                }
                // "/dir/*" covers "/dir"
                prefix.len() > 1
                    && prefix.ends_with('/')
                    && path == &prefix[..prefix.len() - 1]
            }
        }
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathPattern::Any => write!(f, "*"),
            PathPattern::Exact(path) => write!(f, "{}", path),
            PathPattern::Prefix(prefix) => write!(f, "{}*", prefix),
        }
    }
}
