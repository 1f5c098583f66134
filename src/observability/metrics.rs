//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define edge metrics (requests, latency, signature outcomes, upstream errors)
//! - Expose a Prometheus-compatible scrape endpoint
//!
//! # Metrics
//! - `cloudfauxnt_requests_total` (counter): requests by method, status, origin
//! - `cloudfauxnt_request_duration_seconds` (histogram): latency distribution
//! - `cloudfauxnt_signature_outcomes_total` (counter): verification results by outcome
//! - `cloudfauxnt_upstream_errors_total` (counter): failed origin calls by kind
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels stay low-cardinality: origin names, never paths

use std::net::SocketAddr;
use std::time::Instant;

use axum::http::Method;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::security::SignatureOutcome;

pub const REQUESTS_TOTAL: &str = "cloudfauxnt_requests_total";
pub const REQUEST_DURATION: &str = "cloudfauxnt_request_duration_seconds";
pub const SIGNATURE_OUTCOMES: &str = "cloudfauxnt_signature_outcomes_total";
pub const UPSTREAM_ERRORS: &str = "cloudfauxnt_upstream_errors_total";

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;

    describe_counter!(REQUESTS_TOTAL, "Requests answered by the edge");
    describe_histogram!(REQUEST_DURATION, "Time from request receipt to response headers");
    describe_counter!(SIGNATURE_OUTCOMES, "Signed URL verification results");
    describe_counter!(UPSTREAM_ERRORS, "Origin calls that produced no response");

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Method label; extension methods fold into `OTHER`.
pub fn method_label(method: &Method) -> &'static str {
    match *method {
        Method::GET => "GET",
        Method::HEAD => "HEAD",
        Method::POST => "POST",
        Method::PUT => "PUT",
        Method::DELETE => "DELETE",
        Method::OPTIONS => "OPTIONS",
        Method::PATCH => "PATCH",
        Method::CONNECT => "CONNECT",
        Method::TRACE => "TRACE",
        _ => "OTHER",
    }
}

pub fn record_request(method: &Method, status: u16, origin: &str, start: Instant) {
    counter!(
        REQUESTS_TOTAL,
        "method" => method_label(method),
        "status" => status.to_string(),
        "origin" => origin.to_string()
    )
    .increment(1);
    histogram!(REQUEST_DURATION, "origin" => origin.to_string()).record(start.elapsed().as_secs_f64());
}

pub fn record_signature_outcome(outcome: SignatureOutcome) {
    counter!(SIGNATURE_OUTCOMES, "outcome" => outcome.as_str()).increment(1);
}

pub fn record_upstream_error(kind: &'static str, origin: &str) {
    counter!(UPSTREAM_ERRORS, "kind" => kind, "origin" => origin.to_string()).increment(1);
}
