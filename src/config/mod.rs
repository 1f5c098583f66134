//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → compiled into an EdgeState snapshot by the server
//!
//! On reload (file change or SIGHUP):
//!     watcher.rs loads + validates the new file
//!     → ProxyConfig sent to the server
//!     → new EdgeState built (registry, keys, CORS)
//!     → atomic swap; in-flight requests keep the old snapshot
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CorsConfig, KeyConfig, ObservabilityConfig, OriginConfig, ProxyConfig, ServerConfig,
    SigningConfig, UpstreamConfig,
};
