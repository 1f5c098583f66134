//! Custom access policies.
//!
//! A custom policy is a JSON document signed in place of the canned
//! `<url>?Expires=<t>` string. It is carried base64-encoded in the `Policy`
//! query parameter or the `CloudFront-Policy` cookie.
//!
//! ```json
//! {"Statement":[{"Resource":"https://cdn.example.com/private/*",
//!   "Condition":{"DateLessThan":{"AWS:EpochTime":1767225600}}}]}
//! ```
//!
//! Only the first statement is evaluated.

use serde::{Deserialize, Serialize};

/// Parsed custom policy document.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CustomPolicy {
    #[serde(rename = "Statement")]
    pub statement: Vec<Statement>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Statement {
    #[serde(rename = "Resource", default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(rename = "Condition")]
    pub condition: Condition,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Condition {
    #[serde(rename = "DateLessThan", default, skip_serializing_if = "Option::is_none")]
    pub date_less_than: Option<EpochTime>,
    #[serde(rename = "DateGreaterThan", default, skip_serializing_if = "Option::is_none")]
    pub date_greater_than: Option<EpochTime>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct EpochTime {
    #[serde(rename = "AWS:EpochTime")]
    pub epoch_time: i64,
}

/// Result of evaluating a policy whose signature already verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyVerdict {
    Allowed,
    /// No statement or no `DateLessThan`.
    Malformed,
    Expired,
    /// Outside the resource or before `DateGreaterThan`.
    Denied,
}

impl CustomPolicy {
    /// Policy granting `resource` until `expires`.
    pub fn new(resource: impl Into<String>, expires: i64) -> Self {
        Self {
            statement: vec![Statement {
                resource: Some(resource.into()),
                condition: Condition {
                    date_less_than: Some(EpochTime { epoch_time: expires }),
                    date_greater_than: None,
                },
            }],
        }
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn to_json(&self) -> String {
        // Serializing plain structs with string keys cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Evaluate the first statement against the canonical request URL.
    pub fn evaluate(&self, url: &str, now: i64, clock_skew_secs: i64) -> PolicyVerdict {
        let Some(statement) = self.statement.first() else {
            return PolicyVerdict::Malformed;
        };
        let Some(expires) = statement.condition.date_less_than else {
            return PolicyVerdict::Malformed;
        };

        if expires.epoch_time.saturating_add(clock_skew_secs) < now {
            return PolicyVerdict::Expired;
        }
        if let Some(not_before) = statement.condition.date_greater_than {
            if not_before.epoch_time > now.saturating_add(clock_skew_secs) {
                return PolicyVerdict::Denied;
            }
        }
        match &statement.resource {
            Some(resource) if !resource_matches(resource, url) => PolicyVerdict::Denied,
            _ => PolicyVerdict::Allowed,
        }
    }
}

/// Glob match where `*` spans any run of characters, including `/`.
pub fn resource_matches(pattern: &str, url: &str) -> bool {
    let mut parts = pattern.split('*');
    let first = parts.next().unwrap_or_default();
    let Some(mut rest) = url.strip_prefix(first) else {
        return false;
    };

    let tail: Vec<&str> = parts.collect();
    let Some((last, middle)) = tail.split_last() else {
        // No wildcard at all.
        return rest.is_empty();
    };

    for piece in middle {
        match rest.find(piece) {
            Some(pos) => rest = &rest[pos + piece.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}
