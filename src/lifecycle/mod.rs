//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → server stops accepting → process exits
//! ```
//!
//! # Design Decisions
//! - Exit is immediate; in-flight requests are abandoned, not drained
//! - Upstream connections close with the tasks that own them

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, ShutdownSignal};
