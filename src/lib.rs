//! CloudFauxnt: a CloudFront-style edge for local development.
//!
//! Routes requests to origins by path pattern, verifies signed URLs,
//! answers CORS preflights, and forwards everything else with CDN headers.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                      EDGE                        │
//!                         │                                                  │
//!     Client Request      │  ┌─────────┐   ┌────────────┐   ┌───────────┐   │
//!     ────────────────────┼─▶│  http   │──▶│ dispatcher │──▶│  routing  │   │
//!                         │  │ server  │   │            │   │  matcher  │   │
//!                         │  └─────────┘   └─────┬──────┘   └───────────┘   │
//!                         │                      │                          │
//!                         │                      ▼                          │
//!                         │               ┌─────────────┐                   │
//!                         │               │  security   │                   │
//!                         │               │ cors + sig  │                   │
//!                         │               └──────┬──────┘                   │
//!                         │                      ▼                          │
//!     Client Response     │  ┌─────────┐   ┌────────────┐                   │
//!     ◀───────────────────┼──│response │◀──│ forwarder  │◀──────────────────┼──── Origin
//!                         │  └─────────┘   └────────────┘                   │
//!                         │                                                  │
//!                         │  config · observability · resilience · lifecycle │
//!                         └──────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod security;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
