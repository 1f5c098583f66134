//! Request identity and connection metadata.
//!
//! # Responsibilities
//! - Generate the per-request edge id (`X-Amz-Cf-Id`)
//! - Extract the client address recorded by the listener
//!
//! # Design Decisions
//! - Request ID generated as early as possible so every log line and
//!   response carries it
//! - Format mimics CloudFront: uppercase hex, no dashes

use std::fmt;
use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::{Extensions, HeaderValue};
use uuid::Uuid;

/// Synthetic per-request identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRequestId {
    value: HeaderValue,
}

impl EdgeRequestId {
    pub fn generate() -> Self {
        let id = Uuid::new_v4().simple().to_string().to_uppercase();
        Self {
            // Hex digits are always a valid header value.
            value: HeaderValue::from_str(&id).unwrap_or_else(|_| HeaderValue::from_static("0")),
        }
    }

    pub fn as_str(&self) -> &str {
        self.value.to_str().unwrap_or_default()
    }

    pub fn header_value(&self) -> &HeaderValue {
        &self.value
    }
}

impl Default for EdgeRequestId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for EdgeRequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Peer address attached by `into_make_service_with_connect_info`, if any.
pub fn client_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}
