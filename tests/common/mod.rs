//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::IntoResponse,
    routing::any,
    Json, Router,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use cors_gateway::config::{GatewayConfig, RuleConfig};
use cors_gateway::upstream::ForwardHooks;
use cors_gateway::{HttpServer, Shutdown};

pub const ALLOWED_ORIGIN: &str = "http://localhost:5500";

/// Delay applied by the stub's `/v1/slow` route.
pub const SLOW_DELAY: Duration = Duration::from_secs(3);

/// Plain-HTTP stand-in for the upstream API.
///
/// `/v1/slow` answers after [`SLOW_DELAY`], `/v1/missing` answers 404, and
/// every other path echoes what the stub received as JSON.
pub struct StubUpstream {
    pub addr: SocketAddr,
    hits: Arc<AtomicUsize>,
}

impl StubUpstream {
    pub async fn start() -> Self {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route("/v1/slow", any(slow))
            .route("/v1/missing", any(missing))
            .fallback(echo)
            .with_state(hits.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, hits }
    }

    /// Requests that reached the stub so far.
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn echo(
    State(hits): State<Arc<AtomicUsize>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_owned);

    (
        [
            ("x-upstream", "stub"),
            ("access-control-allow-origin", "https://upstream.example"),
        ],
        Json(json!({
            "method": method.as_str(),
            "path": uri.path(),
            "query": uri.query(),
            "host": text(header::HOST.as_str()),
            "token": text("cj-access-token"),
            "user_agent": text(header::USER_AGENT.as_str()),
            "forwarded_for": text("x-forwarded-for"),
            "connection": text(header::CONNECTION.as_str()),
            "hook": text("x-gateway-hook"),
            "body": String::from_utf8_lossy(&body),
        })),
    )
}

async fn slow(State(hits): State<Arc<AtomicUsize>>) -> &'static str {
    hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(SLOW_DELAY).await;
    "late"
}

async fn missing(State(hits): State<Arc<AtomicUsize>>) -> impl IntoResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    (StatusCode::NOT_FOUND, Json(json!({ "result": false, "message": "not found" })))
}

/// Gateway configuration with one `/api/proxy` → `/v1` rule aimed at `upstream`.
pub fn gateway_config(upstream: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.rules = vec![RuleConfig {
        name: "proxy".into(),
        source_prefix: "/api/proxy".into(),
        target_prefix: "/v1".into(),
        upstream_host: upstream.to_string(),
        tls: false,
    }];
    config
}

/// A running gateway; dropping it leaves the task running until the test ends.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

pub async fn spawn_gateway(config: GatewayConfig) -> TestGateway {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    serve(listener, HttpServer::new(config).unwrap())
}

pub async fn spawn_gateway_with_hooks(
    config: GatewayConfig,
    hooks: Arc<dyn ForwardHooks>,
) -> TestGateway {
    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    serve(listener, HttpServer::with_hooks(config, hooks).unwrap())
}

fn serve(listener: TcpListener, server: HttpServer) -> TestGateway {
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let signal = shutdown.signal();
    tokio::spawn(async move {
        server.run(listener, signal).await.unwrap();
    });

    TestGateway { addr, shutdown }
}

/// Client that never routes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// Byte offset just past the first blank line, if a full head has arrived.
fn head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4)
}

/// Raw HTTP/1.1 upstream that answers every bodiless request with `ok`
/// on the same connection and counts accepted connections.
pub struct CountingUpstream {
    pub addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    requests: Arc<AtomicUsize>,
}

impl CountingUpstream {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(AtomicUsize::new(0));

        let (conns, reqs) = (connections.clone(), requests.clone());
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                conns.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(keep_alive(socket, reqs.clone()));
            }
        });

        Self {
            addr,
            connections,
            requests,
        }
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

async fn keep_alive(mut socket: TcpStream, requests: Arc<AtomicUsize>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
        while let Some(end) = head_end(&buf) {
            buf.drain(..end);
            requests.fetch_add(1, Ordering::SeqCst);
            let response = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nok";
            if socket.write_all(response.as_bytes()).await.is_err() {
                return;
            }
        }
    }
}

/// What a [`SilentUpstream`] observed on one connection.
#[derive(Debug)]
pub enum SilentEvent {
    RequestSeen,
    Closed(Instant),
}

/// Raw upstream that reads requests and never answers, reporting when the
/// gateway closes the connection.
pub struct SilentUpstream {
    pub addr: SocketAddr,
    pub events: mpsc::UnboundedReceiver<SilentEvent>,
}

impl SilentUpstream {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, events) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    let mut seen = false;
                    loop {
                        match socket.read(&mut chunk).await {
                            Ok(0) | Err(_) => {
                                let _ = tx.send(SilentEvent::Closed(Instant::now()));
                                return;
                            }
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                        if !seen && head_end(&buf).is_some() {
                            seen = true;
                            let _ = tx.send(SilentEvent::RequestSeen);
                        }
                    }
                });
            }
        });

        Self { addr, events }
    }
}
