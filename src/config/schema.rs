//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener and liveness settings.
    pub server: ServerConfig,

    /// Upstream connection pool and per-call timeout.
    pub upstream: UpstreamConfig,

    /// Signed URL settings and public key material.
    pub signing: SigningConfig,

    /// Cross-origin policy.
    pub cors: CorsConfig,

    /// Origin rules, evaluated in declaration order.
    pub origins: Vec<OriginConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:9001").
    pub bind_address: String,

    /// Liveness path, answered before any routing.
    pub health_path: String,

    /// Object served for `/` when the origin does not set its own.
    pub default_root_object: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9001".to_string(),
            health_path: "/health".to_string(),
            default_root_object: None,
        }
    }
}

/// Upstream client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Connection establishment timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Deadline for an upstream call to produce response headers, in seconds.
    pub request_timeout_secs: u64,

    /// Idle connections kept per origin host.
    pub pool_max_idle_per_host: usize,

    /// Idle connection lifetime in seconds.
    pub pool_idle_timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
            pool_max_idle_per_host: 32,
            pool_idle_timeout_secs: 90,
        }
    }
}

/// Signed URL configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SigningConfig {
    /// Default signature requirement for origins that leave `require_signature` unset.
    pub enabled: bool,

    /// Scheme and authority clients sign against (e.g., "https://cdn.example.com").
    /// When unset the canonical URL is built from `http://` and the Host header.
    pub public_base_url: Option<String>,

    /// Seconds an `Expires` value may lag behind the edge clock.
    pub clock_skew_secs: u64,

    /// Single-key shorthand, merged with `keys`.
    pub key_pair_id: Option<String>,

    /// Public key path for `key_pair_id`.
    pub public_key_path: Option<String>,

    /// Public keys indexed by key pair id.
    pub keys: Vec<KeyConfig>,
}

impl SigningConfig {
    /// All configured keys, shorthand first.
    pub fn all_keys(&self) -> Vec<KeyConfig> {
        let mut keys = Vec::with_capacity(self.keys.len() + 1);
        if let Some(id) = &self.key_pair_id {
            keys.push(KeyConfig {
                key_pair_id: id.clone(),
                public_key_path: self.public_key_path.clone(),
                public_key_pem: None,
            });
        }
        keys.extend(self.keys.iter().cloned());
        keys
    }
}

/// One public key entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeyConfig {
    /// Identifier clients send as `Key-Pair-Id`.
    pub key_pair_id: String,

    /// Path to a PEM file (SPKI or PKCS#1).
    #[serde(default)]
    pub public_key_path: Option<String>,

    /// Inline PEM, used when no path is given.
    #[serde(default)]
    pub public_key_pem: Option<String>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Enable CORS handling.
    pub enabled: bool,

    /// Allowed origins. `*` allows any, `*.example.com` allows subdomains.
    pub allowed_origins: Vec<String>,

    /// Methods advertised on preflight.
    pub allowed_methods: Vec<String>,

    /// Headers advertised on preflight. `*` echoes the requested headers.
    pub allowed_headers: Vec<String>,

    /// Preflight cache lifetime in seconds.
    pub max_age: u64,

    /// Send `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["GET".to_string(), "HEAD".to_string(), "OPTIONS".to_string()],
            allowed_headers: vec!["*".to_string()],
            max_age: 3600,
            allow_credentials: true,
        }
    }
}

/// Origin rule as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OriginConfig {
    /// Origin identifier for logging/metrics.
    pub name: String,

    /// Upstream base URL (e.g., "http://127.0.0.1:9000").
    pub url: String,

    /// Path globs. A trailing `*` matches the rest of the path.
    pub path_patterns: Vec<String>,

    /// Per-origin override of `signing.enabled`.
    #[serde(default)]
    pub require_signature: Option<bool>,

    /// Removed from the request path before forwarding.
    #[serde(default)]
    pub strip_prefix: Option<String>,

    /// Prepended to the path before forwarding.
    #[serde(default)]
    pub target_prefix: Option<String>,

    /// Object served for `/` on this origin.
    #[serde(default)]
    pub default_root_object: Option<String>,

    /// Drop `Expires`, `Signature`, `Key-Pair-Id` and `Policy` from the forwarded query.
    #[serde(default)]
    pub strip_signature_params: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format: "pretty" or "json".
    pub log_format: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
