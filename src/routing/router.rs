//! Origin registry and lookup.
//!
//! # Responsibilities
//! - Compile origin configs into immutable rules
//! - Look up the governing rule for a request path
//! - Return matched rule or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - First match in declaration order wins, like a firewall ACL;
//!   a later, more specific pattern never overrides an earlier one
//! - O(n) pattern scan (acceptable for typical origin counts)

use std::sync::Arc;

use axum::http::uri::Authority;
use thiserror::Error;
use url::Url;

use crate::config::{OriginConfig, ProxyConfig};
use crate::routing::matcher::{Matcher, PathPattern, PatternError};

/// Failure compiling an origin config.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("origin {name}: invalid url: {source}")]
    Url {
        name: String,
        #[source]
        source: url::ParseError,
    },
    #[error("origin {name}: url has no usable host")]
    Authority { name: String },
    #[error("origin {name}: {source}")]
    Pattern {
        name: String,
        #[source]
        source: PatternError,
    },
}

/// Path rewriting applied before a request is sent upstream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathRewrite {
    pub strip_prefix: Option<String>,
    pub target_prefix: Option<String>,
    pub default_root_object: Option<String>,
}

impl PathRewrite {
    /// Rewrite a request path: strip prefix, substitute root object, add target prefix.
    pub fn apply(&self, path: &str) -> String {
        let mut path = match &self.strip_prefix {
            Some(prefix) if !prefix.is_empty() => path.strip_prefix(prefix.as_str()).unwrap_or(path),
            _ => path,
        }
        .to_string();

        if path.is_empty() || path == "/" {
            if let Some(object) = self.default_root_object.as_deref().filter(|o| !o.is_empty()) {
                path = format!("/{}", object.trim_start_matches('/'));
            }
        }

        if let Some(prefix) = self.target_prefix.as_deref().filter(|p| !p.is_empty()) {
            path = format!("{}{}", prefix, path);
        }

        if !path.starts_with('/') {
            path.insert(0, '/');
        }
        path
    }
}

/// An origin rule, immutable after load.
#[derive(Debug, Clone)]
pub struct OriginRule {
    pub name: String,
    pub base_url: Url,
    /// Host (and port) the upstream request is addressed to.
    pub authority: Authority,
    pub patterns: Vec<PathPattern>,
    pub require_signature: bool,
    pub rewrite: PathRewrite,
    pub strip_signature_params: bool,
}

impl OriginRule {
    /// Compile one origin. `signing_default` applies when the origin leaves
    /// `require_signature` unset; `root_object` is the server-wide default.
    pub fn compile(
        config: &OriginConfig,
        signing_default: bool,
        root_object: Option<&str>,
    ) -> Result<Self, RoutingError> {
        let base_url = Url::parse(&config.url).map_err(|source| RoutingError::Url {
            name: config.name.clone(),
            source,
        })?;

        let host = base_url.host_str().ok_or_else(|| RoutingError::Authority {
            name: config.name.clone(),
        })?;
        let authority = match base_url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        let authority: Authority = authority.parse().map_err(|_| RoutingError::Authority {
            name: config.name.clone(),
        })?;

        let patterns = config
            .path_patterns
            .iter()
            .map(|raw| PathPattern::parse(raw))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| RoutingError::Pattern {
                name: config.name.clone(),
                source,
            })?;

        Ok(Self {
            name: config.name.clone(),
            base_url,
            authority,
            patterns,
            require_signature: config.require_signature.unwrap_or(signing_default),
            rewrite: PathRewrite {
                strip_prefix: config.strip_prefix.clone(),
                target_prefix: config.target_prefix.clone(),
                default_root_object: config
                    .default_root_object
                    .clone()
                    .or_else(|| root_object.map(str::to_string)),
            },
            strip_signature_params: config.strip_signature_params,
        })
    }

    /// Returns true if any of this rule's patterns matches the path.
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// Upstream path for a request path: base URL path joined with the rewritten path.
    pub fn upstream_path(&self, request_path: &str) -> String {
        let rewritten = self.rewrite.apply(request_path);
        let base = self.base_url.path().trim_end_matches('/');
        format!("{}{}", base, rewritten)
    }
}

/// Ordered, immutable list of origin rules.
#[derive(Debug, Clone, Default)]
pub struct OriginRegistry {
    rules: Vec<Arc<OriginRule>>,
}

impl OriginRegistry {
    /// Compile every origin in declaration order.
    pub fn from_config(config: &ProxyConfig) -> Result<Self, RoutingError> {
        let root_object = config.server.default_root_object.as_deref();
        let rules = config
            .origins
            .iter()
            .map(|origin| OriginRule::compile(origin, config.signing.enabled, root_object).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { rules })
    }

    /// First rule, in declaration order, with a pattern matching `path`.
    pub fn match_path(&self, path: &str) -> Option<Arc<OriginRule>> {
        self.rules.iter().find(|rule| rule.matches(path)).cloned()
    }

    pub fn rules(&self) -> &[Arc<OriginRule>] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
