//! Development CORS gateway library.
//!
//! Browser front-ends on localhost talk to this gateway; it checks the
//! caller's origin, rewrites the path per rule and relays the exchange to an
//! HTTPS upstream that does not send CORS headers itself.

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
pub mod upstream;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
