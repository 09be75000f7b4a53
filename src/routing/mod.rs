//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path, query)
//!     → router.rs (rule lookup)
//!     → matcher.rs (segment-aware prefix match)
//!     → Return: RouteMatch { rule, rewritten target } or None
//!
//! Rule Compilation (at startup):
//!     RuleConfig[]
//!     → Compile matchers, normalize prefixes
//!     → Freeze as immutable RuleTable
//! ```
//!
//! # Design Decisions
//! - Rules compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same rule
//! - First match wins (configuration order)

pub mod matcher;
pub mod router;

pub use matcher::PathPrefixMatcher;
pub use router::{ProxyRule, RouteMatch, RuleTable};
