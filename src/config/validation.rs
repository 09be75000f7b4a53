//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Reject origins and hosts that could never match exactly
//! - Detect duplicate rule prefixes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::{HeaderName, HeaderValue, Method};
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),

    #[error("at least one rule is required")]
    NoRules,

    #[error("rule '{rule}': {reason}")]
    Rule { rule: String, reason: String },

    #[error("cors.allowed_origins entry '{origin}': {reason}")]
    Origin { origin: String, reason: String },

    #[error("{field}: '{value}' is not a valid header")]
    Header { field: &'static str, value: String },
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_body_bytes == 0 {
        errors.push(ValidationError::NotPositive("listener.max_body_bytes"));
    }

    let upstream = &config.upstream;
    if upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::NotPositive("upstream.connect_timeout_secs"));
    }
    if upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::NotPositive("upstream.request_timeout_secs"));
    }
    if HeaderValue::from_str(&upstream.user_agent).is_err() {
        errors.push(ValidationError::Header {
            field: "upstream.user_agent",
            value: upstream.user_agent.clone(),
        });
    }
    if HeaderName::from_bytes(upstream.credential_header.as_bytes()).is_err() {
        errors.push(ValidationError::Header {
            field: "upstream.credential_header",
            value: upstream.credential_header.clone(),
        });
    }

    validate_rules(config, &mut errors);
    validate_cors(config, &mut errors);

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_rules(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    if config.rules.is_empty() {
        errors.push(ValidationError::NoRules);
        return;
    }

    let mut seen = HashSet::new();
    for rule in &config.rules {
        let mut fail = |reason: String| {
            errors.push(ValidationError::Rule {
                rule: rule.name.clone(),
                reason,
            })
        };

        if !rule.source_prefix.starts_with('/') {
            fail(format!("source_prefix '{}' must start with '/'", rule.source_prefix));
        }
        if rule.source_prefix.contains(['?', '#']) {
            fail(format!("source_prefix '{}' must be a plain path", rule.source_prefix));
        }
        if !rule.target_prefix.is_empty() && !rule.target_prefix.starts_with('/') {
            fail(format!("target_prefix '{}' must be empty or start with '/'", rule.target_prefix));
        }
        if !seen.insert(rule.source_prefix.trim_end_matches('/').to_string()) {
            fail(format!("source_prefix '{}' is already used by an earlier rule", rule.source_prefix));
        }
        if !is_bare_authority(&rule.upstream_host) {
            fail(format!(
                "upstream_host '{}' must be a host or host:port without scheme or path",
                rule.upstream_host
            ));
        }
    }
}

fn validate_cors(config: &GatewayConfig, errors: &mut Vec<ValidationError>) {
    let cors = &config.cors;

    for origin in &cors.allowed_origins {
        if let Err(reason) = check_origin(origin) {
            errors.push(ValidationError::Origin {
                origin: origin.clone(),
                reason,
            });
        }
    }

    for method in &cors.allow_methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::Header {
                field: "cors.allow_methods",
                value: method.clone(),
            });
        }
    }

    let names = cors
        .allow_headers
        .iter()
        .map(|h| ("cors.allow_headers", h))
        .chain(cors.expose_headers.iter().map(|h| ("cors.expose_headers", h)));
    for (field, name) in names {
        if HeaderName::from_bytes(name.as_bytes()).is_err() {
            errors.push(ValidationError::Header {
                field,
                value: name.clone(),
            });
        }
    }
}

/// Origins are compared byte-for-byte against the `Origin` header, which a
/// browser always serializes as `scheme://host[:port]`.
fn check_origin(origin: &str) -> Result<(), String> {
    let url = Url::parse(origin).map_err(|e| e.to_string())?;
    if url.host_str().is_none() {
        return Err("missing host".to_string());
    }
    let serialized = url.origin().ascii_serialization();
    if serialized != origin {
        return Err(format!("not in serialized origin form (expected '{serialized}')"));
    }
    Ok(())
}

fn is_bare_authority(host: &str) -> bool {
    if host.is_empty() || host.contains(['/', '?', '#', '@']) || host.contains("://") {
        return false;
    }
    Url::parse(&format!("https://{host}"))
        .map(|url| url.host_str().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RuleConfig;

    #[test]
    fn default_config_is_valid() {
        assert_eq!(validate_config(&GatewayConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.upstream.request_timeout_secs = 0;
        config.cors.allowed_origins.push("http://localhost:5500/".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::BindAddress("not-an-address".into())));
        assert!(errors.contains(&ValidationError::NotPositive("upstream.request_timeout_secs")));
    }

    #[test]
    fn rejects_origin_with_path_or_wildcard() {
        assert!(check_origin("http://localhost:5500").is_ok());
        assert!(check_origin("https://example.com").is_ok());
        assert!(check_origin("http://localhost:5500/app").is_err());
        assert!(check_origin("*").is_err());
        // Default ports are dropped by browsers.
        assert!(check_origin("https://example.com:443").is_err());
    }

    #[test]
    fn rejects_bad_rules() {
        let mut config = GatewayConfig::default();
        config.rules.push(RuleConfig {
            name: "dup".into(),
            source_prefix: "/api/cj/".into(),
            target_prefix: "v2".into(),
            upstream_host: "https://example.com".into(),
            tls: true,
        });

        let errors = validate_config(&config).unwrap_err();
        let reasons: Vec<_> = errors
            .iter()
            .filter(|e| matches!(e, ValidationError::Rule { rule, .. } if rule == "dup"))
            .collect();
        assert_eq!(reasons.len(), 3);
    }

    #[test]
    fn rejects_empty_rule_table() {
        let mut config = GatewayConfig::default();
        config.rules.clear();
        assert_eq!(validate_config(&config), Err(vec![ValidationError::NoRules]));
    }

    #[test]
    fn upstream_host_forms() {
        assert!(is_bare_authority("developers.cjdropshipping.com"));
        assert!(is_bare_authority("127.0.0.1:8443"));
        assert!(!is_bare_authority(""));
        assert!(!is_bare_authority("example.com/v1"));
        assert!(!is_bare_authority("user@example.com"));
    }
}
