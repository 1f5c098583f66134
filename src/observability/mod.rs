//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every dispatched request produces:
//!     → logging.rs (one structured event per outcome, keyed by X-Amz-Cf-Id)
//!     → metrics.rs (request counter and latency, signature outcomes, upstream errors)
//!
//! Consumers:
//!     → stdout (pretty for humans, JSON for log shippers)
//!     → Prometheus scrape endpoint, when enabled
//! ```
//!
//! # Design Decisions
//! - The edge request id is the correlation key in logs, upstream headers and responses
//! - Metric labels are bounded: method, status, origin name, outcome
//! - Metrics are off unless configured; the macros are no-ops without a recorder

pub mod logging;
pub mod metrics;
