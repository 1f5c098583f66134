//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Matched request:
//!     → cors.rs (origin allow-list, preflight short-circuit)
//!     → signed_url.rs (claim → key lookup → RSA-SHA1 → expiry)
//!         → keys.rs (key pair id → verifying key)
//!         → policy.rs (custom policy conditions)
//!     → headers.rs (hop-by-hop stripping, X-Forwarded-For, Via)
//!     → Pass to forwarder
//! ```
//!
//! # Design Decisions
//! - Fail closed: every verification failure is a 403
//! - Failure reasons stay distinct internally for logs and metrics
//! - Keys and policies are loaded per snapshot and never mutated

pub mod cors;
pub mod headers;
pub mod keys;
pub mod policy;
pub mod signed_url;

pub use cors::{CorsDecision, CorsPolicy};
pub use keys::{KeyError, KeyStore};
pub use policy::{CustomPolicy, PolicyVerdict};
pub use signed_url::{
    CanonicalBase, Clock, FixedClock, SignatureOutcome, SignatureValidator, SystemClock, UrlSigner,
};
