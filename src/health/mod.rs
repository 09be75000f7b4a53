//! Health subsystem.
//!
//! # Data Flow
//! ```text
//! GET /health
//!     → liveness.rs (status, message, timestamp, configured targets)
//!     → 200 JSON, never calls the upstream
//! ```

pub mod liveness;

pub use liveness::{LivenessInfo, LivenessReport};
