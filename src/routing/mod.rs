//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (path)
//!     → router.rs (origin lookup, declaration order)
//!     → matcher.rs (evaluate path globs)
//!     → Return: matched OriginRule or NoMatch
//!
//! Registry Compilation (at startup and on reload):
//!     OriginConfig[]
//!     → Parse path globs
//!     → Resolve signature requirement and path rewrites
//!     → Freeze as immutable OriginRegistry
//! ```
//!
//! # Design Decisions
//! - Registry compiled at load, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always matches same origin
//! - First match wins (declaration order)

pub mod matcher;
pub mod router;

pub use matcher::{Matcher, PathPattern, PatternError};
pub use router::{OriginRegistry, OriginRule, PathRewrite, RoutingError};
