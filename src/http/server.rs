//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID)
//! - Dispatch requests: liveness, gated pre-flight, forwarding, open pre-flight
//! - Enforce the origin allow-list before any upstream traffic
//! - Bound the request body and the whole forward, answering through the hooks
//! - Bind server to listener and stop on shutdown

use std::error::Error as StdError;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderName, Method, Request},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use http_body_util::LengthLimitError;
use thiserror::Error;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::error::{error_chain, GatewayError};
use crate::health::LivenessInfo;
use crate::http::cors::{CorsPolicy, CorsPolicyError};
use crate::http::request::{request_id, MakeRequestUuidV4, X_REQUEST_ID};
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::routing::RuleTable;
use crate::security::AllowedOrigins;
use crate::upstream::{ForwardHooks, Forwarder, ForwarderError, GatewayHooks, RequestContext};

/// Slack added on top of the upstream timeouts for the outer safety net.
const TIMEOUT_GRACE: Duration = Duration::from_secs(5);

/// Errors raised while assembling the server from configuration.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid credential header '{0}'")]
    CredentialHeader(String),

    #[error(transparent)]
    Cors(#[from] CorsPolicyError),

    #[error(transparent)]
    Forwarder(#[from] ForwarderError),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub rules: Arc<RuleTable>,
    pub origins: Arc<AllowedOrigins>,
    pub cors: Arc<CorsPolicy>,
    pub forwarder: Arc<Forwarder>,
    pub liveness: Arc<LivenessInfo>,
    pub max_body_bytes: usize,
    /// Upper bound on one forward, hooks included.
    pub deadline: Duration,
}

impl AppState {
    fn new(
        config: &GatewayConfig,
        cors: Arc<CorsPolicy>,
        hooks: Arc<dyn ForwardHooks>,
    ) -> Result<Self, SetupError> {
        let rules = Arc::new(RuleTable::from_config(&config.rules));
        let targets = rules.rules().iter().map(|rule| rule.base_url()).collect();
        let deadline = Duration::from_secs(config.upstream.request_timeout_secs)
            + Duration::from_secs(config.upstream.connect_timeout_secs)
            + TIMEOUT_GRACE;

        Ok(Self {
            origins: Arc::new(AllowedOrigins::new(config.cors.allowed_origins.iter().cloned())),
            forwarder: Arc::new(Forwarder::new(&config.upstream, hooks)?),
            liveness: Arc::new(LivenessInfo::new(&config.name, targets)),
            max_body_bytes: config.listener.max_body_bytes,
            deadline,
            rules,
            cors,
        })
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the default hooks.
    pub fn new(config: GatewayConfig) -> Result<Self, SetupError> {
        let credential = credential_header(&config)?;
        let cors = Arc::new(CorsPolicy::from_config(&config.cors, &credential)?);
        let hooks = Arc::new(GatewayHooks::new(credential, cors.clone()));
        Self::build(&config, cors, hooks)
    }

    /// Create a server whose forwarder runs custom hooks in place of
    /// [`GatewayHooks`].
    pub fn with_hooks(
        config: GatewayConfig,
        hooks: Arc<dyn ForwardHooks>,
    ) -> Result<Self, SetupError> {
        let credential = credential_header(&config)?;
        let cors = Arc::new(CorsPolicy::from_config(&config.cors, &credential)?);
        Self::build(&config, cors, hooks)
    }

    fn build(
        config: &GatewayConfig,
        cors: Arc<CorsPolicy>,
        hooks: Arc<dyn ForwardHooks>,
    ) -> Result<Self, SetupError> {
        let state = AppState::new(config, cors, hooks)?;

        for rule in state.rules.rules() {
            tracing::info!(
                rule = %rule.name(),
                source_prefix = %rule.source_prefix(),
                target = %rule.base_url(),
                "Proxy rule loaded"
            );
        }

        Ok(Self {
            router: Self::build_router(state),
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/health", get(liveness).options(open_preflight))
            .fallback(dispatch)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    /// The router, for driving the gateway without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires. The listener is dropped at
    /// that point; in-flight requests are not awaited.
    pub async fn run(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        tokio::select! {
            result = axum::serve(listener, app).into_future() => result?,
            _ = shutdown.recv() => tracing::info!("Listener closed"),
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn credential_header(config: &GatewayConfig) -> Result<HeaderName, SetupError> {
    let name = &config.upstream.credential_header;
    HeaderName::from_bytes(name.as_bytes()).map_err(|_| SetupError::CredentialHeader(name.clone()))
}

async fn liveness(State(state): State<AppState>) -> Response {
    state.liveness.report().into_response()
}

async fn open_preflight(State(state): State<AppState>) -> Response {
    state.cors.open_preflight()
}

/// Everything except `/health`: proxy routes first, then the open
/// pre-flight, then not-found.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let Some(matched) = state.rules.match_uri(request.uri()) else {
        let response = if method == Method::OPTIONS {
            state.cors.open_preflight()
        } else {
            tracing::debug!(path = %request.uri().path(), "No rule matched");
            GatewayError::RouteNotMatched {
                path: request.uri().path().to_string(),
            }
            .into_response()
        };
        metrics::record_request(method.as_str(), response.status().as_u16(), "none", start);
        return response;
    };

    let rule = matched.rule;
    let (parts, body) = request.into_parts();
    let request_id = request_id(&parts.headers);
    let origin = parts.headers.get(header::ORIGIN);

    if !state.origins.permits(origin) {
        let err = GatewayError::OriginRejected {
            origin: origin
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .unwrap_or_default(),
        };
        tracing::warn!(
            request_id = %request_id,
            method = %method,
            path = %parts.uri.path(),
            error = %err,
            "Request rejected"
        );
        metrics::record_origin_rejected(rule.name());
        let response = err.into_response();
        metrics::record_request(method.as_str(), response.status().as_u16(), rule.name(), start);
        return response;
    }

    if method == Method::OPTIONS {
        tracing::debug!(request_id = %request_id, path = %parts.uri.path(), "Pre-flight accepted");
        let response = state.cors.gated_preflight(origin);
        metrics::record_request(method.as_str(), response.status().as_u16(), rule.name(), start);
        return response;
    }

    let ctx = RequestContext {
        request_id,
        method: &parts.method,
        uri: &parts.uri,
        headers: &parts.headers,
        rule,
        client_addr: parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr),
    };

    let response = match read_body(&parts.headers, body, state.max_body_bytes).await {
        Ok(bytes) => {
            let target = matched.upstream_url();
            let forward = state.forwarder.forward(&ctx, &target, bytes);
            match tokio::time::timeout(state.deadline, forward).await {
                Ok(response) => response,
                Err(_) => {
                    tracing::error!(
                        request_id = %request_id,
                        method = %method,
                        path = %parts.uri.path(),
                        deadline_ms = state.deadline.as_millis() as u64,
                        "Forward exceeded the gateway deadline"
                    );
                    state.forwarder.reject(&ctx, GatewayError::UpstreamTimeout)
                }
            }
        }
        Err(err) => {
            tracing::warn!(
                request_id = %request_id,
                method = %method,
                path = %parts.uri.path(),
                error = %err,
                "Request body rejected"
            );
            state.forwarder.reject(&ctx, err)
        }
    };

    metrics::record_request(method.as_str(), response.status().as_u16(), rule.name(), start);
    response
}

/// Buffer the request body, refusing it once it passes `limit` bytes. A
/// declared `Content-Length` over the limit is refused without reading.
async fn read_body(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    if let Some(length) = declared {
        if length > limit as u64 {
            return Err(GatewayError::RequestBody(format!(
                "content length {length} exceeds the {limit} byte limit"
            )));
        }
    }

    to_bytes(body, limit).await.map_err(|err| {
        if exceeds_limit(&err) {
            GatewayError::RequestBody(format!("body exceeds the {limit} byte limit"))
        } else {
            GatewayError::UnreadableBody(error_chain(&err))
        }
    })
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(inner) = source {
        if inner.is::<LengthLimitError>() {
            return true;
        }
        source = inner.source();
    }
    false
}
