//! Proxy forwarder.
//!
//! # Responsibilities
//! - Build the upstream request for a matched origin rule
//! - Send it over a pooled connection under a bounded deadline
//! - Relay the upstream response with hop-by-hop headers removed
//!
//! # Design Decisions
//! - One call per request, no retries
//! - Body streams in both directions; nothing is buffered
//! - Dropping the returned future (client went away) drops the upstream call
//! - `https` origins are verified against the webpki root set

use std::time::Duration;

use axum::body::Body;
use axum::http::uri::PathAndQuery;
use axum::http::{HeaderValue, Request, Response, Uri};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::config::UpstreamConfig;
use crate::http::request::client_ip;
use crate::resilience::{bounded, BoundedError};
use crate::routing::OriginRule;
use crate::security::headers::{prepare_upstream_headers, strip_hop_by_hop, CACHE_MISS, X_CACHE};
use crate::security::signed_url::SIGNATURE_PARAMS;

/// Why an upstream call produced no response.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("failed to reach origin: {0}")]
    Unavailable(String),

    #[error("origin did not respond within {0:?}")]
    Timeout(Duration),
}

/// Pooled HTTP/HTTPS client for origin traffic.
#[derive(Clone)]
pub struct Forwarder {
    client: Client<HttpsConnector<HttpConnector>, Body>,
    request_timeout: Duration,
}

impl Forwarder {
    pub fn new(config: &UpstreamConfig) -> Result<Self, rustls::Error> {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.connect_timeout_secs)));
        connector.set_nodelay(true);
        connector.enforce_http(false);

        let connector = HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(rustls::crypto::ring::default_provider())?
            .https_or_http()
            .enable_http1()
            .wrap_connector(connector);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .build(connector);

        Ok(Self {
            client,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        })
    }

    /// Forward `request` to the origin described by `rule`.
    pub async fn forward(
        &self,
        rule: &OriginRule,
        request: Request<Body>,
        request_id: &HeaderValue,
    ) -> Result<Response<Body>, UpstreamError> {
        let (mut parts, body) = request.into_parts();
        let client = client_ip(&parts.extensions);
        let uri = upstream_uri(rule, &parts.uri)?;
        prepare_upstream_headers(&mut parts.headers, &rule.authority, client, request_id);

        let mut upstream = Request::new(body);
        *upstream.method_mut() = parts.method;
        *upstream.uri_mut() = uri;
        *upstream.headers_mut() = parts.headers;

        tracing::debug!(origin = %rule.name, uri = %upstream.uri(), "Forwarding to origin");

        let response: Response<Incoming> = match bounded(self.request_timeout, self.client.request(upstream)).await {
            Ok(response) => response,
            Err(BoundedError::Elapsed(deadline)) => return Err(UpstreamError::Timeout(deadline)),
            Err(BoundedError::Inner(e)) => return Err(UpstreamError::Unavailable(e.to_string())),
        };

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        parts.headers.insert(X_CACHE, HeaderValue::from_static(CACHE_MISS));
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Absolute upstream URI: origin scheme and authority, rewritten path, forwarded query.
pub fn upstream_uri(rule: &OriginRule, request_uri: &Uri) -> Result<Uri, UpstreamError> {
    let path = rule.upstream_path(request_uri.path());
    let path_and_query = match request_uri
        .query()
        .and_then(|q| forwarded_query(q, rule.strip_signature_params))
    {
        Some(query) => format!("{}?{}", path, query),
        None => path,
    };
    let path_and_query: PathAndQuery = path_and_query
        .parse()
        .map_err(|e: axum::http::uri::InvalidUri| UpstreamError::Unavailable(e.to_string()))?;

    Uri::builder()
        .scheme(rule.base_url.scheme())
        .authority(rule.authority.clone())
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| UpstreamError::Unavailable(e.to_string()))
}

/// Query string sent upstream; `None` when nothing remains.
fn forwarded_query(query: &str, strip_signature_params: bool) -> Option<String> {
    if !strip_signature_params {
        return (!query.is_empty()).then(|| query.to_string());
    }
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| {
            let key = pair.split('=').next().unwrap_or_default();
            !pair.is_empty() && !SIGNATURE_PARAMS.contains(&key)
        })
        .collect();
    (!kept.is_empty()).then(|| kept.join("&"))
}
