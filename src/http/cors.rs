//! Cross-origin response headers.
//!
//! # Responsibilities
//! - Answer pre-flight requests (origin-gated on proxy routes, open elsewhere)
//! - Decorate relayed responses so the browser may read them
//!
//! # Design Decisions
//! - Header values are rendered once at startup
//! - Allowed callers get their own origin echoed back; `*` only when the
//!   caller sent no `Origin`
//! - Upstream `Access-Control-*` values are replaced, upstream `Vary` kept

use axum::{
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::config::CorsConfig;

#[derive(Debug, Error)]
#[error("invalid CORS header list for {field}: {value}")]
pub struct CorsPolicyError {
    field: &'static str,
    value: String,
}

/// Pre-rendered CORS header values.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
    expose_headers: HeaderValue,
    max_age: HeaderValue,
}

impl CorsPolicy {
    /// Build the policy. The credential header is always advertised, even if
    /// the configured lists omit it.
    pub fn from_config(
        config: &CorsConfig,
        credential_header: &HeaderName,
    ) -> Result<Self, CorsPolicyError> {
        Ok(Self {
            allow_methods: render("cors.allow_methods", config.allow_methods.clone())?,
            allow_headers: render(
                "cors.allow_headers",
                with_header(&config.allow_headers, credential_header),
            )?,
            expose_headers: render(
                "cors.expose_headers",
                with_header(&config.expose_headers, credential_header),
            )?,
            max_age: HeaderValue::from(config.max_age_secs),
        })
    }

    /// Pre-flight answer for a proxy route whose origin already passed the
    /// allow-list.
    pub fn gated_preflight(&self, origin: Option<&HeaderValue>) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, echo(origin));
        headers.insert(header::VARY, HeaderValue::from_static("Origin"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());
        (StatusCode::OK, headers).into_response()
    }

    /// Pre-flight answer for any path outside the proxy routes. Not gated.
    pub fn open_preflight(&self) -> Response {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        (StatusCode::OK, headers).into_response()
    }

    /// Add CORS headers to a response relayed from (or on behalf of) the
    /// upstream.
    pub fn decorate(&self, origin: Option<&HeaderValue>, headers: &mut HeaderMap) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, echo(origin));
        headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone());
        headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone());
        headers.insert(header::ACCESS_CONTROL_EXPOSE_HEADERS, self.expose_headers.clone());
        add_vary_origin(headers);
    }
}

fn echo(origin: Option<&HeaderValue>) -> HeaderValue {
    origin
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"))
}

fn with_header(list: &[String], name: &HeaderName) -> Vec<String> {
    let mut list = list.to_vec();
    if !list.iter().any(|h| h.eq_ignore_ascii_case(name.as_str())) {
        list.push(name.to_string());
    }
    list
}

fn render(field: &'static str, list: Vec<String>) -> Result<HeaderValue, CorsPolicyError> {
    let value = list.join(", ");
    HeaderValue::from_str(&value).map_err(|_| CorsPolicyError { field, value })
}

fn add_vary_origin(headers: &mut HeaderMap) {
    let present = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|v| {
            let v = v.trim();
            v == "*" || v.eq_ignore_ascii_case("origin")
        });
    if !present {
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CorsPolicy {
        CorsPolicy::from_config(
            &CorsConfig::default(),
            &HeaderName::from_static("cj-access-token"),
        )
        .unwrap()
    }

    #[test]
    fn gated_preflight_echoes_origin() {
        let origin = HeaderValue::from_static("http://localhost:5500");
        let response = policy().gated_preflight(Some(&origin));
        let headers = response.headers();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:5500");
        assert_eq!(headers[header::VARY], "Origin");
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET, POST, PUT, DELETE, OPTIONS"
        );
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, Authorization, CJ-Access-Token"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_MAX_AGE], "86400");
    }

    #[test]
    fn gated_preflight_without_origin_uses_wildcard() {
        let response = policy().gated_preflight(None);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }

    #[test]
    fn open_preflight_is_wildcard_without_max_age() {
        let response = policy().open_preflight();
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.get(header::ACCESS_CONTROL_MAX_AGE).is_none());
        assert!(headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).is_some());
    }

    #[test]
    fn decorate_replaces_upstream_cors_and_merges_vary() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("https://cj.test"));
        headers.insert(header::VARY, HeaderValue::from_static("Accept-Encoding"));
        let origin = HeaderValue::from_static("http://localhost:3000");

        policy().decorate(Some(&origin), &mut headers);

        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "http://localhost:3000");
        let vary: Vec<_> = headers.get_all(header::VARY).iter().collect();
        assert_eq!(vary, ["Accept-Encoding", "Origin"]);
        assert_eq!(
            headers[header::ACCESS_CONTROL_EXPOSE_HEADERS],
            "Content-Type, Authorization, CJ-Access-Token"
        );
    }

    #[test]
    fn decorate_does_not_duplicate_vary() {
        let mut headers = HeaderMap::new();
        headers.insert(header::VARY, HeaderValue::from_static("origin, accept"));
        policy().decorate(None, &mut headers);
        assert_eq!(headers.get_all(header::VARY).iter().count(), 1);
    }

    #[test]
    fn credential_header_is_always_advertised() {
        let config = CorsConfig {
            allow_headers: vec!["Content-Type".into()],
            expose_headers: vec![],
            ..CorsConfig::default()
        };
        let policy =
            CorsPolicy::from_config(&config, &HeaderName::from_static("x-api-token")).unwrap();
        let response = policy.gated_preflight(None);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "Content-Type, x-api-token"
        );
    }
}
