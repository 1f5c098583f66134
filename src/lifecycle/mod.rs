//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Validate config → Compile registry → Load keys → Build snapshot
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//!     SIGHUP → Reload config into a new snapshot
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then keys, then listeners
//! - Only startup failures are fatal; reload failures are logged

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{build_edge_state, StartupError};
