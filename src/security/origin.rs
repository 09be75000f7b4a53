//! Origin allow-list.
//!
//! # Responsibilities
//! - Hold the configured set of origins
//! - Decide whether a request's `Origin` may use the proxy routes
//!
//! # Design Decisions
//! - Exact byte comparison, no prefix or wildcard matching
//! - An absent `Origin` is allowed (non-browser callers)
//! - A present but non-UTF-8 `Origin` is rejected

use std::collections::HashSet;

use axum::http::HeaderValue;

/// Immutable set of origins allowed on proxy routes.
#[derive(Debug, Clone, Default)]
pub struct AllowedOrigins {
    origins: HashSet<String>,
}

impl AllowedOrigins {
    pub fn new<I, S>(origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            origins: origins.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, origin: &str) -> bool {
        self.origins.contains(origin)
    }

    /// Returns true if a request carrying this `Origin` header may proceed.
    pub fn permits(&self, origin: Option<&HeaderValue>) -> bool {
        match origin {
            None => true,
            Some(value) => value
                .to_str()
                .map(|origin| self.contains(origin))
                .unwrap_or(false),
        }
    }
}
