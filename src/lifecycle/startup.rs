//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Compile the routing, key, CORS and upstream subsystems in dependency order
//! - Produce the immutable snapshot the server publishes
//!
//! # Design Decisions
//! - Fail fast: any error here is fatal at startup
//! - The same path serves reloads; there a failure keeps the old snapshot

use thiserror::Error;

use crate::config::validation::validate_config;
use crate::config::{ConfigError, ProxyConfig};
use crate::http::dispatcher::EdgeState;
use crate::http::forwarder::Forwarder;
use crate::routing::{OriginRegistry, RoutingError};
use crate::security::{CorsPolicy, KeyError, SignatureValidator};

/// Reasons the edge cannot begin serving.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid origin: {0}")]
    Routing(#[from] RoutingError),

    #[error("unreadable key material: {0}")]
    Keys(#[from] KeyError),

    #[error("failed to initialise upstream TLS: {0}")]
    Tls(#[from] rustls::Error),

    #[error("failed to bind listener: {0}")]
    Bind(#[from] std::io::Error),
}

/// Build a complete serving snapshot from a configuration.
pub fn build_edge_state(config: &ProxyConfig) -> Result<EdgeState, StartupError> {
    validate_config(config).map_err(ConfigError::Validation)?;

    let registry = OriginRegistry::from_config(config)?;
    let validator = SignatureValidator::from_config(&config.signing)?;
    let cors = CorsPolicy::from_config(&config.cors);
    let forwarder = Forwarder::new(&config.upstream)?;

    tracing::info!(
        origins = registry.len(),
        keys = validator.keys().len(),
        cors_enabled = cors.is_enabled(),
        "Edge snapshot built"
    );

    Ok(EdgeState {
        health_path: config.server.health_path.clone(),
        registry,
        validator,
        cors,
        forwarder,
    })
}
