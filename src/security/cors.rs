//! Cross-origin policy engine.
//!
//! # Responsibilities
//! - Decide whether a request's `Origin` is allowed
//! - Answer preflight requests without touching the origin
//! - Hand the dispatcher headers to attach to any other response
//!
//! # Design Decisions
//! - Pure decision over method + headers; the dispatcher owns the response
//! - A disallowed origin is rejected outright rather than silently served
//! - Allowed origins are echoed, never answered with a bare `*`, so
//!   credentialed requests keep working

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE, ACCESS_CONTROL_REQUEST_HEADERS, ORIGIN, VARY,
};
use axum::http::{HeaderMap, HeaderValue, Method};

use crate::config::CorsConfig;

/// One entry of the origin allow-list.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OriginPattern {
    Any,
    /// `*.example.com`, stored as `.example.com`.
    Subdomain(String),
    Exact(String),
}

impl OriginPattern {
    fn parse(raw: &str) -> Self {
        match raw {
            "*" => OriginPattern::Any,
            _ if raw.starts_with("*.") => OriginPattern::Subdomain(raw[1..].to_string()),
            _ => OriginPattern::Exact(raw.to_string()),
        }
    }

    fn allows(&self, origin: &str) -> bool {
        match self {
            OriginPattern::Any => true,
            OriginPattern::Subdomain(domain) => origin.ends_with(domain.as_str()),
            OriginPattern::Exact(exact) => exact == origin,
        }
    }
}

/// What the dispatcher should do about CORS for one request.
#[derive(Debug, Clone, Default)]
pub enum CorsDecision {
    /// CORS disabled or no `Origin` header: nothing to add.
    #[default]
    Skip,
    /// Preflight answered here; terminal.
    Preflight(HeaderMap),
    /// Attach these headers to whatever response is produced.
    Attach(HeaderMap),
    /// `Origin` present but not on the allow-list.
    Denied,
}

impl CorsDecision {
    /// CORS headers for any response to this request, when the origin is allowed.
    /// An `OPTIONS` that ends up rejected still carries its preflight headers.
    pub fn response_headers(&self) -> Option<&HeaderMap> {
        match self {
            CorsDecision::Attach(headers) | CorsDecision::Preflight(headers) => Some(headers),
            CorsDecision::Skip | CorsDecision::Denied => None,
        }
    }
}

/// Compiled CORS configuration.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    enabled: bool,
    origins: Vec<OriginPattern>,
    methods: Option<HeaderValue>,
    headers: Option<HeaderValue>,
    echo_request_headers: bool,
    max_age: u64,
    allow_credentials: bool,
}

impl CorsPolicy {
    pub fn from_config(config: &CorsConfig) -> Self {
        let joined = |list: &[String]| HeaderValue::from_str(&list.join(", ")).ok();
        Self {
            enabled: config.enabled,
            origins: config.allowed_origins.iter().map(|o| OriginPattern::parse(o)).collect(),
            methods: joined(&config.allowed_methods),
            headers: joined(&config.allowed_headers),
            echo_request_headers: config.allowed_headers.iter().any(|h| h == "*"),
            max_age: config.max_age,
            allow_credentials: config.allow_credentials,
        }
    }

    pub fn disabled() -> Self {
        Self::from_config(&CorsConfig::default())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.origins.iter().any(|pattern| pattern.allows(origin))
    }

    /// Decide how CORS applies to a request.
    pub fn decide(&self, method: &Method, request_headers: &HeaderMap) -> CorsDecision {
        if !self.enabled {
            return CorsDecision::Skip;
        }
        let Some(origin) = request_headers.get(ORIGIN) else {
            return CorsDecision::Skip;
        };
        let allowed = origin.to_str().map(|o| self.origin_allowed(o)).unwrap_or(false);
        if !allowed {
            return CorsDecision::Denied;
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        headers.insert(VARY, HeaderValue::from_static("Origin"));
        if self.allow_credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }

        if *method != Method::OPTIONS {
            return CorsDecision::Attach(headers);
        }

        if let Some(methods) = &self.methods {
            headers.insert(ACCESS_CONTROL_ALLOW_METHODS, methods.clone());
        }
        if self.echo_request_headers {
            if let Some(requested) = request_headers.get(ACCESS_CONTROL_REQUEST_HEADERS) {
                headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
            }
        } else if let Some(allowed) = &self.headers {
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, allowed.clone());
        }
        if self.max_age > 0 {
            headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from(self.max_age));
        }
        CorsDecision::Preflight(headers)
    }
}

impl Default for CorsPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}
