//! Upstream forwarding client.
//!
//! # Responsibilities
//! - Own the shared keep-alive connection pool
//! - Build the outbound request (host, user agent, forwarded headers)
//! - Run the exchange under connect and total timeouts
//! - Relay the upstream response as a stream
//!
//! # Design Decisions
//! - One `reqwest::Client` for every rule; its pool is safe for concurrent use
//! - Redirects are relayed to the caller, never followed
//! - Dropping the returned future aborts the upstream exchange
//! - Failures never escape: they become responses through `on_error`

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    http::{header, header::InvalidHeaderValue, HeaderValue},
    response::Response,
};
use reqwest::{redirect, Client, Url};
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::error::GatewayError;
use crate::security::headers::{append_forwarded, outbound_headers, strip_hop_by_hop};
use crate::upstream::hooks::{ForwardHooks, OutboundRequest, RequestContext};

#[derive(Debug, Error)]
pub enum ForwarderError {
    #[error("invalid user agent: {0}")]
    UserAgent(#[from] InvalidHeaderValue),

    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    user_agent: HeaderValue,
    forwarded_headers: bool,
    hooks: Arc<dyn ForwardHooks>,
}

impl Forwarder {
    pub fn new(config: &UpstreamConfig, hooks: Arc<dyn ForwardHooks>) -> Result<Self, ForwarderError> {
        let user_agent = HeaderValue::from_str(&config.user_agent)?;

        let mut builder = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(redirect::Policy::none());

        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }

        Ok(Self {
            client: builder.build()?,
            user_agent,
            forwarded_headers: config.forwarded_headers,
            hooks,
        })
    }

    /// Forward one request to `target` and produce the caller's response.
    pub async fn forward(&self, ctx: &RequestContext<'_>, target: &str, body: Bytes) -> Response {
        let outbound = match self.prepare(ctx, target, body) {
            Ok(outbound) => outbound,
            Err(err) => return self.fail(ctx, err),
        };
        let outbound = self.hooks.on_request(ctx, outbound);

        tracing::info!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.uri.path(),
            rule = %ctx.rule.name(),
            target = %outbound.url,
            "Proxying request"
        );

        let start = Instant::now();
        let mut request = self
            .client
            .request(outbound.method, outbound.url)
            .headers(outbound.headers);
        if !outbound.body.is_empty() {
            request = request.body(outbound.body);
        }
        let result = request.send().await;

        match result {
            Ok(upstream) => {
                tracing::info!(
                    request_id = %ctx.request_id,
                    status = upstream.status().as_u16(),
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Upstream responded"
                );
                self.hooks.on_response(ctx, relay(upstream))
            }
            Err(err) => self.fail(ctx, GatewayError::from_upstream(err)),
        }
    }

    fn prepare(
        &self,
        ctx: &RequestContext<'_>,
        target: &str,
        body: Bytes,
    ) -> Result<OutboundRequest, GatewayError> {
        let invalid = |reason: String| GatewayError::InvalidUpstreamUrl {
            url: target.to_string(),
            reason,
        };

        let url = Url::parse(target).map_err(|e| invalid(e.to_string()))?;
        let host = HeaderValue::from_str(ctx.rule.upstream_host())
            .map_err(|e| invalid(e.to_string()))?;

        let mut headers = outbound_headers(ctx.headers);
        headers.insert(header::HOST, host);
        headers.insert(header::USER_AGENT, self.user_agent.clone());
        if self.forwarded_headers {
            append_forwarded(&mut headers, ctx.client_addr, ctx.headers.get(header::HOST));
        }

        Ok(OutboundRequest {
            method: ctx.method.clone(),
            url,
            headers,
            body,
        })
    }

    fn fail(&self, ctx: &RequestContext<'_>, err: GatewayError) -> Response {
        tracing::error!(
            request_id = %ctx.request_id,
            method = %ctx.method,
            path = %ctx.uri.path(),
            rule = %ctx.rule.name(),
            error = %err,
            "Upstream request failed"
        );
        self.reject(ctx, err)
    }

    /// Answer without contacting the upstream.
    pub fn reject(&self, ctx: &RequestContext<'_>, err: GatewayError) -> Response {
        self.hooks.on_error(ctx, err)
    }
}

/// Convert the upstream response, streaming its body through unchanged.
fn relay(upstream: reqwest::Response) -> Response {
    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
