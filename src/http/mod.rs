//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, dispatch)
//!     → request.rs (request ID)
//!     → [routing::RuleTable picks a rule]
//!     → cors.rs (pre-flight answers, response decoration)
//!     → [upstream::Forwarder relays the exchange]
//!     → Send to client
//! ```

pub mod cors;
pub mod request;
pub mod server;

pub use cors::CorsPolicy;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, SetupError};
