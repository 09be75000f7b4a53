//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so an empty file yields a working gateway.

use serde::{Deserialize, Serialize};

/// Browser-like identification sent upstream in place of the caller's.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36";

/// Header carrying the upstream API credential.
pub const DEFAULT_CREDENTIAL_HEADER: &str = "CJ-Access-Token";

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Display name, used in the liveness message.
    pub name: String,

    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Upstream client settings shared by every rule.
    pub upstream: UpstreamConfig,

    /// Proxy rules, evaluated in order. First match wins.
    pub rules: Vec<RuleConfig>,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            name: "CJ Dropshipping CORS Proxy Server".to_string(),
            listener: ListenerConfig::default(),
            upstream: UpstreamConfig::default(),
            rules: vec![RuleConfig::default()],
            cors: CorsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:3001").
    pub bind_address: String,

    /// Largest request body accepted for forwarding, in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:3001".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Upstream client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Total request timeout (connect, send, full response) in seconds.
    pub request_timeout_secs: u64,

    /// How long an idle keep-alive connection stays in the pool.
    pub pool_idle_timeout_secs: u64,

    /// Maximum idle connections kept per upstream host.
    pub pool_max_idle_per_host: usize,

    /// Outbound `User-Agent` override.
    pub user_agent: String,

    /// Credential header propagated from the caller when present.
    pub credential_header: String,

    /// Append `X-Forwarded-For`, `X-Forwarded-Proto` and `X-Forwarded-Host`.
    pub forwarded_headers: bool,

    /// Honor `HTTP_PROXY`/`HTTPS_PROXY` from the environment.
    pub use_system_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            request_timeout_secs: 30,
            pool_idle_timeout_secs: 90,
            pool_max_idle_per_host: 16,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            credential_header: DEFAULT_CREDENTIAL_HEADER.to_string(),
            forwarded_headers: true,
            use_system_proxy: false,
        }
    }
}

/// A single prefix-rewrite rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RuleConfig {
    /// Rule identifier for logging/metrics.
    pub name: String,

    /// Inbound path prefix to match (segment boundary).
    pub source_prefix: String,

    /// Replacement for `source_prefix` in the outbound path.
    #[serde(default)]
    pub target_prefix: String,

    /// Upstream authority (`host` or `host:port`).
    pub upstream_host: String,

    /// Use HTTPS towards the upstream.
    #[serde(default = "default_tls")]
    pub tls: bool,
}

fn default_tls() -> bool {
    true
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            name: "cj".to_string(),
            source_prefix: "/api/cj".to_string(),
            target_prefix: "/api2.0/v1".to_string(),
            upstream_host: "developers.cjdropshipping.com".to_string(),
            tls: true,
        }
    }
}

/// Cross-origin policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Exact origins (`scheme://host[:port]`) allowed on proxy routes.
    pub allowed_origins: Vec<String>,

    /// Methods advertised in `Access-Control-Allow-Methods`.
    pub allow_methods: Vec<String>,

    /// Headers advertised in `Access-Control-Allow-Headers`.
    pub allow_headers: Vec<String>,

    /// Headers advertised in `Access-Control-Expose-Headers`.
    pub expose_headers: Vec<String>,

    /// Pre-flight cache lifetime in seconds.
    pub max_age_secs: u64,
}

impl Default for CorsConfig {
    fn default() -> Self {
        let headers = vec![
            "Content-Type".to_string(),
            "Authorization".to_string(),
            DEFAULT_CREDENTIAL_HEADER.to_string(),
        ];
        Self {
            allowed_origins: vec![
                "http://localhost:5500".to_string(),
                "http://127.0.0.1:5500".to_string(),
                "http://localhost:52000".to_string(),
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
            allow_methods: ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
                .iter()
                .map(|m| m.to_string())
                .collect(),
            allow_headers: headers.clone(),
            expose_headers: headers,
            max_age_secs: 86_400,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
