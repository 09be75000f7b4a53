//! Extension points around a forwarded exchange.
//!
//! The forwarder calls `on_request` once the outbound request is built,
//! `on_response` once upstream headers arrive and `on_error` when the
//! exchange fails. Each hook takes a value and returns a possibly modified
//! one; the defaults pass everything through unchanged.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Uri},
    response::{IntoResponse, Response},
};
use reqwest::Url;

use crate::error::GatewayError;
use crate::http::cors::CorsPolicy;
use crate::routing::ProxyRule;

/// What the hooks may know about the inbound request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub request_id: &'a str,
    pub method: &'a Method,
    pub uri: &'a Uri,
    pub headers: &'a HeaderMap,
    pub rule: &'a ProxyRule,
    pub client_addr: Option<SocketAddr>,
}

impl<'a> RequestContext<'a> {
    pub fn origin(&self) -> Option<&'a HeaderValue> {
        self.headers.get(header::ORIGIN)
    }
}

/// The request about to be sent upstream.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub trait ForwardHooks: Send + Sync + fmt::Debug {
    fn on_request(&self, _ctx: &RequestContext<'_>, outbound: OutboundRequest) -> OutboundRequest {
        outbound
    }

    fn on_response(&self, _ctx: &RequestContext<'_>, response: Response) -> Response {
        response
    }

    fn on_error(&self, _ctx: &RequestContext<'_>, error: GatewayError) -> Response {
        error.into_response()
    }
}

/// Hooks that leave every exchange untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl ForwardHooks for PassThrough {}

/// Default gateway behavior: credential propagation on the way out, CORS
/// decoration on the way back, including on error responses.
#[derive(Debug, Clone)]
pub struct GatewayHooks {
    credential_header: HeaderName,
    cors: Arc<CorsPolicy>,
}

impl GatewayHooks {
    pub fn new(credential_header: HeaderName, cors: Arc<CorsPolicy>) -> Self {
        Self {
            credential_header,
            cors,
        }
    }
}

impl ForwardHooks for GatewayHooks {
    fn on_request(&self, ctx: &RequestContext<'_>, mut outbound: OutboundRequest) -> OutboundRequest {
        match ctx.headers.get(&self.credential_header) {
            Some(value) => {
                outbound
                    .headers
                    .insert(self.credential_header.clone(), value.clone());
            }
            None => {
                outbound.headers.remove(&self.credential_header);
            }
        }
        outbound
    }

    fn on_response(&self, ctx: &RequestContext<'_>, mut response: Response) -> Response {
        self.cors.decorate(ctx.origin(), response.headers_mut());
        response
    }

    fn on_error(&self, ctx: &RequestContext<'_>, error: GatewayError) -> Response {
        let mut response = error.into_response();
        self.cors.decorate(ctx.origin(), response.headers_mut());
        response
    }
}
