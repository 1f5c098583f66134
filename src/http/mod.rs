//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, snapshot load, request id)
//!     → dispatcher.rs (health → match → CORS → signature → forward)
//!     → forwarder.rs (pooled upstream call under a deadline)
//!     → response.rs (XML errors, CDN and CORS headers)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod forwarder;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::{Disposition, EdgeState, ProxyDecision, ProxyError};
pub use forwarder::{Forwarder, UpstreamError};
pub use request::EdgeRequestId;
pub use server::HttpServer;
