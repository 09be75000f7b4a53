//! Request-scoped gateway errors and their client-visible form.
//!
//! Every failure surfaced to a caller is either an empty-bodied status
//! (origin rejection, no route) or a JSON object with `error` and `message`.

use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("origin '{origin}' is not allowed")]
    OriginRejected { origin: String },

    #[error("no proxy rule matches {path}")]
    RouteNotMatched { path: String },

    #[error("upstream did not respond in time")]
    UpstreamTimeout,

    #[error("{0}")]
    UpstreamConnection(String),

    #[error("invalid upstream url '{url}': {reason}")]
    InvalidUpstreamUrl { url: String, reason: String },

    #[error("request body rejected: {0}")]
    RequestBody(String),

    #[error("request body unreadable: {0}")]
    UnreadableBody(String),
}

impl GatewayError {
    /// Classify a failed upstream exchange.
    pub fn from_upstream(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout
        } else {
            Self::UpstreamConnection(error_chain(&err))
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::OriginRejected { .. } => StatusCode::FORBIDDEN,
            Self::RouteNotMatched { .. } => StatusCode::NOT_FOUND,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::UpstreamConnection(_) | Self::InvalidUpstreamUrl { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::RequestBody(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::UnreadableBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            GatewayError::OriginRejected { .. } | GatewayError::RouteNotMatched { .. } => {
                return status.into_response();
            }
            GatewayError::UpstreamTimeout => "Gateway timeout",
            GatewayError::UpstreamConnection(_) | GatewayError::InvalidUpstreamUrl { .. } => {
                "Proxy error"
            }
            GatewayError::RequestBody(_) => "Payload too large",
            GatewayError::UnreadableBody(_) => "Bad request",
        };

        let body = ErrorBody {
            error,
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Render an error with all of its sources, outermost first.
pub fn error_chain(err: &dyn StdError) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn origin_rejection_has_empty_body() {
        let response = GatewayError::OriginRejected {
            origin: "http://evil.test".into(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[tokio::test]
    async fn timeout_hides_duration() {
        let response = GatewayError::UpstreamTimeout.into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Gateway timeout");
        assert_eq!(json["message"], "upstream did not respond in time");
    }

    #[tokio::test]
    async fn connection_failure_carries_description() {
        let response =
            GatewayError::UpstreamConnection("connection refused".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Proxy error");
        assert_eq!(json["message"], "connection refused");
    }

    #[tokio::test]
    async fn body_errors_split_by_cause() {
        let too_large = GatewayError::RequestBody("body exceeds the 16 byte limit".into());
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body_json(too_large.into_response()).await["error"], "Payload too large");

        let unreadable = GatewayError::UnreadableBody("connection reset".into());
        assert_eq!(unreadable.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(unreadable.into_response()).await["error"], "Bad request");
    }

    #[test]
    fn chain_includes_sources() {
        #[derive(Debug, Error)]
        #[error("outer")]
        struct Outer(#[source] std::io::Error);

        let err = Outer(std::io::Error::new(std::io::ErrorKind::Other, "inner"));
        assert_eq!(error_chain(&err), "outer: inner");
    }
}
