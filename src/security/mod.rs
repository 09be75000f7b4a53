//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Request on a proxy route:
//!     → origin.rs (allow-list check, fail fast before any upstream call)
//!     → headers.rs (hop-by-hop stripping, X-Forwarded-*)
//! ```

pub mod headers;
pub mod origin;

pub use origin::AllowedOrigins;
