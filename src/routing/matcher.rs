//! Path prefix matching.
//!
//! # Responsibilities
//! - Match request paths against a configured prefix
//! - Return the unmatched remainder for rewriting
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Matching stops at segment boundaries: `/api/cj` matches `/api/cj`
//!   and `/api/cj/orders`, never `/api/cjx`
//! - No regex to guarantee O(n) matching

/// Matches the request path against a prefix on segment boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    /// Stored without a trailing slash; empty means "every path".
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self {
            prefix: prefix.trim_end_matches('/').to_string(),
        }
    }

    /// The normalized prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the part of `path` after the prefix, or `None` if the path
    /// does not match. The remainder is either empty or starts with `/`.
    pub fn strip<'p>(&self, path: &'p str) -> Option<&'p str> {
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}
