//! Rule lookup and path rewriting.
//!
//! # Responsibilities
//! - Store compiled proxy rules
//! - Look up the matching rule for a request URI
//! - Rewrite the matched prefix into the upstream path
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan (acceptable for typical rule counts)
//! - First match wins, in configuration order
//! - Explicit `None` rather than a silent default rule

use axum::http::Uri;

use crate::config::RuleConfig;
use crate::routing::matcher::PathPrefixMatcher;

/// A compiled prefix-rewrite rule towards one upstream host.
#[derive(Debug, Clone)]
pub struct ProxyRule {
    name: String,
    matcher: PathPrefixMatcher,
    target_prefix: String,
    upstream_host: String,
    tls: bool,
}

impl ProxyRule {
    pub fn from_config(config: &RuleConfig) -> Self {
        Self {
            name: config.name.clone(),
            matcher: PathPrefixMatcher::new(config.source_prefix.as_str()),
            target_prefix: config.target_prefix.trim_end_matches('/').to_string(),
            upstream_host: config.upstream_host.clone(),
            tls: config.tls,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_prefix(&self) -> &str {
        self.matcher.prefix()
    }

    /// Authority sent as the outbound `Host`.
    pub fn upstream_host(&self) -> &str {
        &self.upstream_host
    }

    pub fn scheme(&self) -> &'static str {
        if self.tls {
            "https"
        } else {
            "http"
        }
    }

    /// Base URL every path under this rule is forwarded to.
    pub fn base_url(&self) -> String {
        format!("{}://{}{}", self.scheme(), self.upstream_host, self.target_prefix)
    }

    /// Substitute the target prefix for the matched source prefix.
    fn rewrite(&self, remainder: &str, query: Option<&str>) -> String {
        let mut path = format!("{}{}", self.target_prefix, remainder);
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = query {
            path.push('?');
            path.push_str(query);
        }
        path
    }
}

/// The outcome of a successful lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch<'r> {
    pub rule: &'r ProxyRule,
    /// Rewritten path and query for the upstream.
    pub target: String,
}

impl RouteMatch<'_> {
    /// Absolute upstream URL for this match.
    pub fn upstream_url(&self) -> String {
        format!(
            "{}://{}{}",
            self.rule.scheme(),
            self.rule.upstream_host(),
            self.target
        )
    }
}

/// Ordered, immutable table of proxy rules.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<ProxyRule>,
}

impl RuleTable {
    pub fn from_config(configs: &[RuleConfig]) -> Self {
        Self {
            rules: configs.iter().map(ProxyRule::from_config).collect(),
        }
    }

    pub fn rules(&self) -> &[ProxyRule] {
        &self.rules
    }

    /// Find the first rule matching the URI's path.
    pub fn match_uri(&self, uri: &Uri) -> Option<RouteMatch<'_>> {
        self.rules.iter().find_map(|rule| {
            let remainder = rule.matcher.strip(uri.path())?;
            Some(RouteMatch {
                rule,
                target: rule.rewrite(remainder, uri.query()),
            })
        })
    }
}
