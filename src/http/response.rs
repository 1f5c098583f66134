//! Response rendering.
//!
//! # Responsibilities
//! - Turn a [`Disposition`] into the HTTP response sent to the client
//! - Render CloudFront-style XML error bodies
//! - Stamp edge identity and CORS headers on every response
//!
//! # Design Decisions
//! - Forwarded bodies stream through untouched
//! - CORS headers ride on error responses too, so browsers see the real error

use axum::body::Body;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderValue, Response, StatusCode};

use crate::http::dispatcher::{Disposition, ProxyDecision, ProxyError};
use crate::http::request::EdgeRequestId;
use crate::security::headers::apply_edge_headers;

pub const HEALTH_BODY: &str = r#"{"status":"healthy"}"#;

/// Final response for a dispatched request.
pub fn render(disposition: Disposition, decision: &ProxyDecision, request_id: &EdgeRequestId) -> Response<Body> {
    let mut response = match disposition {
        Disposition::Healthy => health_response(),
        Disposition::Preflight(headers) => {
            let mut response = empty(StatusCode::NO_CONTENT);
            response.headers_mut().extend(headers);
            response
        }
        Disposition::Forwarded(response) => response,
        Disposition::Rejected(err) => error_response(&err, request_id),
    };

    if let Some(cors) = decision.cors.response_headers() {
        for (name, value) in cors {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }
    apply_edge_headers(response.headers_mut(), request_id.header_value());
    response
}

pub fn health_response() -> Response<Body> {
    let mut response = Response::new(Body::from(HEALTH_BODY));
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// XML error document in the shape CloudFront returns.
pub fn error_response(err: &ProxyError, request_id: &EdgeRequestId) -> Response<Body> {
    let body = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<Error>\n  <Code>{}</Code>\n  <Message>{}</Message>\n  <RequestId>{}</RequestId>\n</Error>",
        err.code(),
        xml_escape(&err.to_string()),
        request_id,
    );
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = err.status();
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/xml"));
    response
}

fn empty(status: StatusCode) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

fn xml_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            c => escaped.push(c),
        }
    }
    escaped
}
