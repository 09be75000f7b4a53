//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Matched, origin-approved request
//!     → client.rs (build outbound request, shared keep-alive pool)
//!     → hooks.rs on_request (credential propagation)
//!     → upstream over TLS, bounded by connect/total timeouts
//!     → hooks.rs on_response (CORS decoration)
//!        or hooks.rs on_error (JSON error, CORS decoration)
//! ```

pub mod client;
pub mod hooks;

pub use client::{Forwarder, ForwarderError};
pub use hooks::{ForwardHooks, GatewayHooks, OutboundRequest, PassThrough, RequestContext};
