//! Request dispatcher.
//!
//! # States
//! ```text
//! RECEIVED
//!     → health path?          HEALTHY          (200, CORS headers if allowed)
//!     → CORS_CHECK    denied → FORBIDDEN       (403)
//!                     preflight → PREFLIGHT_OK (204, no match, origin untouched)
//!     → MATCH_ORIGIN  none →  NOT_FOUND        (404)
//!     → SIGNATURE_CHECK  not permitted → FORBIDDEN (403)
//!     → FORWARD       unavailable → BAD_GATEWAY (502)
//!                     timeout → GATEWAY_TIMEOUT (504)
//!                     response → RESPOND
//! ```
//!
//! # Design Decisions
//! - Each step is a fallible function; `?` carries the first failure out
//! - No state survives a request; the snapshot is read-only
//! - Every path ends in a [`Disposition`], never a propagated error

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderMap, Request, Response, StatusCode};
use thiserror::Error;

use crate::http::forwarder::{Forwarder, UpstreamError};
use crate::http::request::EdgeRequestId;
use crate::routing::{OriginRegistry, OriginRule};
use crate::security::{CorsDecision, CorsPolicy, SignatureOutcome, SignatureValidator};

/// Everything a request needs, published atomically as one snapshot.
#[derive(Debug)]
pub struct EdgeState {
    pub health_path: String,
    pub registry: OriginRegistry,
    pub validator: SignatureValidator,
    pub cors: CorsPolicy,
    pub forwarder: Forwarder,
}

/// Per-request failures; each maps to exactly one status.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("The specified path does not match any configured origin")]
    OriginNotFound,

    #[error("Origin is not allowed by the CORS policy")]
    CorsOriginDenied,

    #[error("{}", signature_message(.0))]
    Signature(SignatureOutcome),

    #[error("Failed to reach origin: {0}")]
    UpstreamUnavailable(String),

    #[error("Origin did not respond within {0:?}")]
    UpstreamTimeout(Duration),
}

fn signature_message(outcome: &SignatureOutcome) -> &'static str {
    match outcome {
        SignatureOutcome::MissingParameters => "Missing required signature parameters",
        SignatureOutcome::UnknownKey => "Unknown key pair id",
        SignatureOutcome::BadSignature => "Invalid signature",
        SignatureOutcome::Expired => "Request has expired",
        SignatureOutcome::PolicyDenied => "Request is not permitted by the signed policy",
        SignatureOutcome::NotRequired | SignatureOutcome::Valid => "Access denied",
    }
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::OriginNotFound => StatusCode::NOT_FOUND,
            ProxyError::CorsOriginDenied | ProxyError::Signature(_) => StatusCode::FORBIDDEN,
            ProxyError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// CloudFront error code for the XML body.
    pub fn code(&self) -> &'static str {
        match self {
            ProxyError::OriginNotFound => "NoSuchKey",
            ProxyError::CorsOriginDenied | ProxyError::Signature(_) => "AccessDenied",
            ProxyError::UpstreamUnavailable(_) => "BadGateway",
            ProxyError::UpstreamTimeout(_) => "GatewayTimeout",
        }
    }
}

impl From<UpstreamError> for ProxyError {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::Unavailable(reason) => ProxyError::UpstreamUnavailable(reason),
            UpstreamError::Timeout(deadline) => ProxyError::UpstreamTimeout(deadline),
        }
    }
}

/// Terminal state of one request.
#[derive(Debug)]
pub enum Disposition {
    Healthy,
    Preflight(HeaderMap),
    Forwarded(Response<Body>),
    Rejected(ProxyError),
}

impl Disposition {
    pub fn status(&self) -> StatusCode {
        match self {
            Disposition::Healthy => StatusCode::OK,
            Disposition::Preflight(_) => StatusCode::NO_CONTENT,
            Disposition::Forwarded(response) => response.status(),
            Disposition::Rejected(err) => err.status(),
        }
    }
}

/// What the pipeline learned on the way to its disposition.
#[derive(Debug, Default)]
pub struct ProxyDecision {
    pub rule: Option<Arc<OriginRule>>,
    pub cors: CorsDecision,
    pub signature: Option<SignatureOutcome>,
}

impl ProxyDecision {
    pub fn origin_name(&self) -> &str {
        self.rule.as_deref().map(|r| r.name.as_str()).unwrap_or("none")
    }
}

/// Drive one request through the state machine.
pub async fn dispatch(
    state: &EdgeState,
    request: Request<Body>,
    request_id: &EdgeRequestId,
    now: i64,
) -> (Disposition, ProxyDecision) {
    let mut decision = ProxyDecision {
        cors: state.cors.decide(request.method(), request.headers()),
        ..ProxyDecision::default()
    };

    if request.uri().path() == state.health_path {
        // Liveness never fails on CORS; a denied origin just gets no headers.
        if matches!(decision.cors, CorsDecision::Denied) {
            decision.cors = CorsDecision::Skip;
        }
        return (Disposition::Healthy, decision);
    }

    let disposition = match run_pipeline(state, request, request_id, now, &mut decision).await {
        Ok(disposition) => disposition,
        Err(err) => Disposition::Rejected(err),
    };
    (disposition, decision)
}

async fn run_pipeline(
    state: &EdgeState,
    request: Request<Body>,
    request_id: &EdgeRequestId,
    now: i64,
    decision: &mut ProxyDecision,
) -> Result<Disposition, ProxyError> {
    if let Some(headers) = check_cors(&decision.cors)? {
        return Ok(Disposition::Preflight(headers));
    }

    let rule = match_origin(&state.registry, request.uri().path())?;
    decision.rule = Some(rule.clone());

    let outcome = state
        .validator
        .verify(&rule, request.uri(), request.headers(), now);
    decision.signature = Some(outcome);
    check_signature(outcome)?;

    let response = state
        .forwarder
        .forward(&rule, request, request_id.header_value())
        .await?;
    Ok(Disposition::Forwarded(response))
}

fn match_origin(registry: &OriginRegistry, path: &str) -> Result<Arc<OriginRule>, ProxyError> {
    registry.match_path(path).ok_or(ProxyError::OriginNotFound)
}

/// `Some` when the CORS engine fully answered the request.
fn check_cors(cors: &CorsDecision) -> Result<Option<HeaderMap>, ProxyError> {
    match cors {
        CorsDecision::Denied => Err(ProxyError::CorsOriginDenied),
        CorsDecision::Preflight(headers) => Ok(Some(headers.clone())),
        CorsDecision::Skip | CorsDecision::Attach(_) => Ok(None),
    }
}

fn check_signature(outcome: SignatureOutcome) -> Result<(), ProxyError> {
    if outcome.permits_forwarding() {
        Ok(())
    } else {
        Err(ProxyError::Signature(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{OriginConfig, ProxyConfig};
    use crate::lifecycle::startup::build_edge_state;
    use axum::http::Method;

    fn state(cors_enabled: bool, signing: bool) -> EdgeState {
        let mut config = ProxyConfig::default();
        config.cors.enabled = cors_enabled;
        config.signing.keys.push(crate::config::KeyConfig {
            key_pair_id: "K1".into(),
            public_key_path: None,
            public_key_pem: Some(include_str!("../../tests/fixtures/public.pem").into()),
        });
        // Nothing listens on port 1; forwarding tests live in tests/.
        config.origins.push(OriginConfig {
            name: "private".into(),
            url: "http://127.0.0.1:1".into(),
            path_patterns: vec!["/private/*".into()],
            require_signature: Some(signing),
            strip_prefix: None,
            target_prefix: None,
            default_root_object: None,
            strip_signature_params: false,
        });
        build_edge_state(&config).unwrap()
    }

    fn request(method: Method, uri: &str, origin: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(origin) = origin {
            builder = builder.header("origin", origin);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn run(state: &EdgeState, request: Request<Body>) -> (Disposition, ProxyDecision) {
        dispatch(state, request, &EdgeRequestId::generate(), 0).await
    }

    #[tokio::test]
    async fn test_health_bypasses_everything() {
        let state = state(true, true);
        let (disposition, decision) = run(&state, request(Method::POST, "/health", Some("http://evil"))).await;
        assert!(matches!(disposition, Disposition::Healthy));
        assert!(decision.rule.is_none());
    }

    #[tokio::test]
    async fn test_unmatched_path_is_not_found() {
        let state = state(false, false);
        let (disposition, _) = run(&state, request(Method::GET, "/unknown/x", None)).await;
        assert_eq!(disposition.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unmatched_preflight_is_answered_without_matching() {
        let state = state(true, true);
        let (disposition, decision) =
            run(&state, request(Method::OPTIONS, "/unknown/x", Some("http://app.example"))).await;
        assert_eq!(disposition.status(), StatusCode::NO_CONTENT);
        assert!(decision.rule.is_none());
        assert!(decision.signature.is_none());
    }

    #[tokio::test]
    async fn test_health_carries_cors_for_allowed_origin() {
        let state = state(true, true);
        let (disposition, decision) = run(&state, request(Method::GET, "/health", Some("http://app.example"))).await;
        assert!(matches!(disposition, Disposition::Healthy));
        let headers = decision.cors.response_headers().unwrap();
        assert_eq!(headers["access-control-allow-origin"], "http://app.example");
    }

    #[tokio::test]
    async fn test_denied_origin_is_forbidden_before_matching() {
        let mut config = ProxyConfig::default();
        config.cors.enabled = true;
        config.cors.allowed_origins = vec!["https://app.example".into()];
        let state = build_edge_state(&config).unwrap();

        let (disposition, _) = run(&state, request(Method::GET, "/unknown/x", Some("https://evil.example"))).await;
        assert_eq!(disposition.status(), StatusCode::FORBIDDEN);

        let (health, decision) = run(&state, request(Method::GET, "/health", Some("https://evil.example"))).await;
        assert!(matches!(health, Disposition::Healthy));
        assert!(decision.cors.response_headers().is_none());
    }

    #[tokio::test]
    async fn test_preflight_short_circuits_before_signature() {
        let state = state(true, true);
        let (disposition, decision) =
            run(&state, request(Method::OPTIONS, "/private/a.txt", Some("http://app.example"))).await;
        assert!(matches!(disposition, Disposition::Preflight(_)));
        assert!(decision.signature.is_none());
    }

    #[tokio::test]
    async fn test_missing_signature_is_forbidden() {
        let state = state(false, true);
        let (disposition, decision) = run(&state, request(Method::GET, "/private/a.txt", None)).await;
        assert_eq!(disposition.status(), StatusCode::FORBIDDEN);
        assert_eq!(decision.signature, Some(SignatureOutcome::MissingParameters));
        assert_eq!(decision.origin_name(), "private");
    }

    #[tokio::test]
    async fn test_unreachable_origin_is_bad_gateway() {
        let state = state(false, false);
        let (disposition, decision) = run(&state, request(Method::GET, "/private/a.txt", None)).await;
        assert_eq!(disposition.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(decision.signature, Some(SignatureOutcome::NotRequired));
    }

    #[test]
    fn test_error_taxonomy() {
        assert_eq!(ProxyError::OriginNotFound.code(), "NoSuchKey");
        assert_eq!(ProxyError::Signature(SignatureOutcome::Expired).status(), StatusCode::FORBIDDEN);
        assert_eq!(ProxyError::Signature(SignatureOutcome::Expired).code(), "AccessDenied");
        let timeout: ProxyError = UpstreamError::Timeout(Duration::from_secs(1)).into();
        assert_eq!(timeout.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(timeout.code(), "GatewayTimeout");
    }
}
