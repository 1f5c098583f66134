//! Header manipulation at the edge.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Rewrite `Host` and extend `X-Forwarded-For` / `Via` on forwarded requests
//! - Stamp CDN identity headers (`Server`, `Via`, `X-Amz-Cf-Id`) on responses
//!
//! # Design Decisions
//! - Headers named by `Connection` are treated as hop-by-hop too
//! - Upstream-set headers are otherwise left untouched; `Via` is appended,
//!   never replaced

use std::net::IpAddr;
use std::sync::LazyLock;

use axum::http::header::{CONNECTION, HOST, SERVER, VIA};
use axum::http::uri::Authority;
use axum::http::{HeaderMap, HeaderName, HeaderValue};

pub const SERVER_NAME: &str = "CloudFauxnt";
pub const VIA_HOP: &str = "1.1 cloudfauxnt";
pub const CACHE_MISS: &str = "Miss from cloudfauxnt";

pub const X_AMZ_CF_ID: HeaderName = HeaderName::from_static("x-amz-cf-id");
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "proxy-connection",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Remove hop-by-hop headers, including any listed in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| name.trim().parse::<HeaderName>().ok())
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

/// Append this edge to any existing `Via` chain.
pub fn append_via(headers: &mut HeaderMap) {
    let via = match headers.get(VIA).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{}, {}", existing, VIA_HOP),
        _ => VIA_HOP.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&via) {
        headers.insert(VIA, value);
    }
}

/// Append the client address to `X-Forwarded-For`.
pub fn append_forwarded_for(headers: &mut HeaderMap, client_ip: IpAddr) {
    let chain = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{}, {}", existing, client_ip),
        _ => client_ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&chain) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Turn client request headers into the headers sent to the origin.
pub fn prepare_upstream_headers(
    headers: &mut HeaderMap,
    authority: &Authority,
    client_ip: Option<IpAddr>,
    request_id: &HeaderValue,
) {
    strip_hop_by_hop(headers);
    headers.remove(HOST);
    if let Ok(host) = HeaderValue::from_str(authority.as_str()) {
        headers.insert(HOST, host);
    }
    if let Some(ip) = client_ip {
        append_forwarded_for(headers, ip);
    }
    append_via(headers);
    headers.insert(X_AMZ_CF_ID, request_id.clone());
}

/// Identity headers every edge response carries.
pub fn apply_edge_headers(headers: &mut HeaderMap, request_id: &HeaderValue) {
    headers.insert(SERVER, HeaderValue::from_static(SERVER_NAME));
    append_via(headers);
    headers.insert(X_AMZ_CF_ID, request_id.clone());
}
