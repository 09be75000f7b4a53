//! Liveness report.
//!
//! Answers without touching the upstream, so it succeeds for as long as the
//! process can serve HTTP at all.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

/// Static part of the report, fixed at startup.
#[derive(Debug, Clone)]
pub struct LivenessInfo {
    message: String,
    targets: Vec<String>,
}

impl LivenessInfo {
    pub fn new(name: &str, targets: Vec<String>) -> Self {
        Self {
            message: format!("{name} is running"),
            targets,
        }
    }

    /// Snapshot the report at the current instant.
    pub fn report(&self) -> LivenessReport {
        LivenessReport {
            status: "OK",
            message: self.message.clone(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            targets: self.targets.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LivenessReport {
    pub status: &'static str,
    pub message: String,
    pub timestamp: String,
    pub targets: Vec<String>,
}

impl IntoResponse for LivenessReport {
    fn into_response(self) -> Response {
        (
            StatusCode::OK,
            [(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"))],
            Json(self),
        )
            .into_response()
    }
}
