//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to origin:
//!     → timeouts.rs (connect timeout on the connector, per-call deadline here)
//!     → On failure: reported once, never retried
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - No retries; each request reaches the origin at most once

pub mod timeouts;

pub use timeouts::{bounded, BoundedError};
