//! Signed URL verification.
//!
//! # Responsibilities
//! - Extract the signed claim from the query string (or signed cookies)
//! - Rebuild the canonical string the client signed
//! - Verify RSA PKCS#1 v1.5 / SHA-1 signatures against the key store
//! - Enforce expiry and custom policy conditions
//!
//! # Canonical form
//! ```text
//! <public base url><raw request path>?Expires=<Expires as sent>
//! ```
//! Other query parameters are never part of the signed string. The base
//! comes from `signing.public_base_url`; without it, `http://<Host>`.
//!
//! # Design Decisions
//! - Verification order is fixed: parse → key lookup → signature → expiry,
//!   so an expired request with a forged signature reports `BadSignature`
//! - `Signature` accepts standard base64 and the CloudFront URL-safe
//!   alphabet (`-` `_` `~` for `+` `=` `/`)
//! - Pure: the caller supplies `now`; the key store is read-only

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::{header, HeaderMap, Uri};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs1v15::{Signature, SigningKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use rsa::RsaPrivateKey;
use sha1::Sha1;

use crate::config::SigningConfig;
use crate::routing::OriginRule;
use crate::security::keys::{KeyError, KeyStore};
use crate::security::policy::{CustomPolicy, PolicyVerdict};

pub const EXPIRES: &str = "Expires";
pub const SIGNATURE: &str = "Signature";
pub const KEY_PAIR_ID: &str = "Key-Pair-Id";
pub const POLICY: &str = "Policy";

pub const COOKIE_EXPIRES: &str = "CloudFront-Expires";
pub const COOKIE_POLICY: &str = "CloudFront-Policy";
pub const COOKIE_SIGNATURE: &str = "CloudFront-Signature";
pub const COOKIE_KEY_PAIR_ID: &str = "CloudFront-Key-Pair-Id";

/// Query parameters that belong to the signing scheme.
pub const SIGNATURE_PARAMS: [&str; 4] = [EXPIRES, SIGNATURE, KEY_PAIR_ID, POLICY];

/// Source of the current unix time.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }
}

/// A clock frozen at a given unix time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now(&self) -> i64 {
        self.0
    }
}

/// Result of checking a request against its origin's signature requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureOutcome {
    NotRequired,
    Valid,
    MissingParameters,
    UnknownKey,
    BadSignature,
    Expired,
    PolicyDenied,
}

impl SignatureOutcome {
    /// Only these two outcomes let a request reach the origin.
    pub fn permits_forwarding(self) -> bool {
        matches!(self, SignatureOutcome::NotRequired | SignatureOutcome::Valid)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SignatureOutcome::NotRequired => "not_required",
            SignatureOutcome::Valid => "valid",
            SignatureOutcome::MissingParameters => "missing_parameters",
            SignatureOutcome::UnknownKey => "unknown_key",
            SignatureOutcome::BadSignature => "bad_signature",
            SignatureOutcome::Expired => "expired",
            SignatureOutcome::PolicyDenied => "policy_denied",
        }
    }
}

impl std::fmt::Display for SignatureOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the scheme and host of the canonical URL come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanonicalBase {
    /// Configured public base URL, trailing slash removed.
    Configured(String),
    /// `http://` plus the request authority or Host header.
    RequestHost,
}

impl CanonicalBase {
    pub fn from_config(public_base_url: Option<&str>) -> Self {
        match public_base_url {
            Some(base) => CanonicalBase::Configured(base.trim_end_matches('/').to_string()),
            None => CanonicalBase::RequestHost,
        }
    }

    /// The URL the client is expected to have signed, without query.
    pub fn resource_url(&self, uri: &Uri, headers: &HeaderMap) -> Option<String> {
        match self {
            CanonicalBase::Configured(base) => Some(format!("{}{}", base, uri.path())),
            CanonicalBase::RequestHost => {
                let host = uri
                    .authority()
                    .map(|a| a.as_str().to_string())
                    .or_else(|| {
                        headers
                            .get(header::HOST)
                            .and_then(|h| h.to_str().ok())
                            .map(str::to_string)
                    })?;
                Some(format!("http://{}{}", host, uri.path()))
            }
        }
    }
}

/// The string a canned-policy signature covers.
pub fn canned_policy_string(resource_url: &str, expires: &str) -> String {
    format!("{}?{}={}", resource_url, EXPIRES, expires)
}

/// Decode standard or CloudFront URL-safe base64.
///
/// A space is read as `+`, undoing form decoding of an unescaped plus, so
/// only whitespace other than spaces is trimmed.
pub fn decode_cloudfront_base64(value: &str) -> Option<Vec<u8>> {
    let normalized: String = value
        .trim_matches(|c: char| c.is_ascii_whitespace() && c != ' ')
        .chars()
        .map(|c| match c {
            '-' | ' ' => '+',
            '_' => '=',
            '~' => '/',
            c => c,
        })
        .collect();
    STANDARD.decode(normalized.as_bytes()).ok()
}

/// Encode with the CloudFront URL-safe alphabet.
pub fn encode_cloudfront_base64(bytes: &[u8]) -> String {
    STANDARD
        .encode(bytes)
        .chars()
        .map(|c| match c {
            '+' => '-',
            '=' => '_',
            '/' => '~',
            c => c,
        })
        .collect()
}

/// Decode a query string; the first occurrence of a key wins.
pub fn parse_query(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        params.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }
    params
}

/// Collect cookies from every Cookie header; the first occurrence wins.
pub fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for value in headers.get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else { continue };
        for pair in value.split(';') {
            if let Some((name, val)) = pair.trim().split_once('=') {
                cookies
                    .entry(name.trim().to_string())
                    .or_insert_with(|| val.trim().to_string());
            }
        }
    }
    cookies
}

/// What the signature was computed over.
#[derive(Debug, Clone, PartialEq, Eq)]
enum SignedPolicy {
    Canned { expires_raw: String, expires: i64 },
    Custom { encoded: String },
}

/// Claim parsed from one request; never outlives verification.
#[derive(Debug, Clone, PartialEq, Eq)]
struct SignedUrlClaim {
    policy: SignedPolicy,
    signature: String,
    key_pair_id: String,
}

impl SignedUrlClaim {
    /// Query parameters take precedence; signed cookies are read only when
    /// the query carries no `Signature`. `None` means absent or malformed.
    fn from_request(uri: &Uri, headers: &HeaderMap) -> Option<Self> {
        let query = uri.query().map(parse_query).unwrap_or_default();
        if query.contains_key(SIGNATURE) {
            return Self::from_fields(&query, EXPIRES, POLICY, SIGNATURE, KEY_PAIR_ID);
        }

        let cookies = parse_cookies(headers);
        if cookies.contains_key(COOKIE_SIGNATURE) {
            return Self::from_fields(
                &cookies,
                COOKIE_EXPIRES,
                COOKIE_POLICY,
                COOKIE_SIGNATURE,
                COOKIE_KEY_PAIR_ID,
            );
        }
        None
    }

    fn from_fields(
        fields: &HashMap<String, String>,
        expires: &str,
        policy: &str,
        signature: &str,
        key_pair_id: &str,
    ) -> Option<Self> {
        let get = |name: &str| fields.get(name).filter(|v| !v.is_empty()).cloned();

        let signature = get(signature)?;
        let key_pair_id = get(key_pair_id)?;
        let policy = match get(policy) {
            Some(encoded) => SignedPolicy::Custom { encoded },
            None => {
                let expires_raw = get(expires)?;
                let expires = expires_raw.parse::<i64>().ok()?;
                SignedPolicy::Canned { expires_raw, expires }
            }
        };

        Some(Self {
            policy,
            signature,
            key_pair_id,
        })
    }
}

/// Verifies signed requests for origins that require them.
#[derive(Debug)]
pub struct SignatureValidator {
    keys: KeyStore,
    base: CanonicalBase,
    clock_skew_secs: i64,
}

impl SignatureValidator {
    pub fn new(keys: KeyStore, base: CanonicalBase, clock_skew_secs: u64) -> Self {
        Self {
            keys,
            base,
            clock_skew_secs: i64::try_from(clock_skew_secs).unwrap_or(i64::MAX),
        }
    }

    /// Load keys and canonicalization settings from config.
    pub fn from_config(signing: &SigningConfig) -> Result<Self, KeyError> {
        Ok(Self::new(
            KeyStore::load(signing)?,
            CanonicalBase::from_config(signing.public_base_url.as_deref()),
            signing.clock_skew_secs,
        ))
    }

    pub fn keys(&self) -> &KeyStore {
        &self.keys
    }

    pub fn base(&self) -> &CanonicalBase {
        &self.base
    }

    /// Check a request against `rule` at unix time `now`.
    pub fn verify(&self, rule: &OriginRule, uri: &Uri, headers: &HeaderMap, now: i64) -> SignatureOutcome {
        if !rule.require_signature {
            return SignatureOutcome::NotRequired;
        }

        let Some(claim) = SignedUrlClaim::from_request(uri, headers) else {
            return SignatureOutcome::MissingParameters;
        };
        let Some(key) = self.keys.get(&claim.key_pair_id) else {
            return SignatureOutcome::UnknownKey;
        };
        let Some(resource_url) = self.base.resource_url(uri, headers) else {
            return SignatureOutcome::BadSignature;
        };
        let Some(signature) = decode_cloudfront_base64(&claim.signature)
            .and_then(|bytes| Signature::try_from(bytes.as_slice()).ok())
        else {
            return SignatureOutcome::BadSignature;
        };

        match claim.policy {
            SignedPolicy::Canned { expires_raw, expires } => {
                let message = canned_policy_string(&resource_url, &expires_raw);
                if key.verify(message.as_bytes(), &signature).is_err() {
                    return SignatureOutcome::BadSignature;
                }
                if expires.saturating_add(self.clock_skew_secs) < now {
                    return SignatureOutcome::Expired;
                }
                SignatureOutcome::Valid
            }
            SignedPolicy::Custom { encoded } => {
                let Some(document) = decode_cloudfront_base64(&encoded) else {
                    return SignatureOutcome::BadSignature;
                };
                if key.verify(&document, &signature).is_err() {
                    return SignatureOutcome::BadSignature;
                }
                let Ok(policy) = CustomPolicy::from_json(&document) else {
                    return SignatureOutcome::BadSignature;
                };
                match policy.evaluate(&resource_url, now, self.clock_skew_secs) {
                    PolicyVerdict::Allowed => SignatureOutcome::Valid,
                    PolicyVerdict::Malformed => SignatureOutcome::BadSignature,
                    PolicyVerdict::Expired => SignatureOutcome::Expired,
                    PolicyVerdict::Denied => SignatureOutcome::PolicyDenied,
                }
            }
        }
    }
}

/// Produces URLs and cookies in exactly the form [`SignatureValidator`] accepts.
pub struct UrlSigner {
    key: SigningKey<Sha1>,
    key_pair_id: String,
}

impl UrlSigner {
    pub fn new(private_key: RsaPrivateKey, key_pair_id: impl Into<String>) -> Self {
        Self {
            key: SigningKey::<Sha1>::new(private_key),
            key_pair_id: key_pair_id.into(),
        }
    }

    /// Accepts PKCS#8 (`PRIVATE KEY`) or PKCS#1 (`RSA PRIVATE KEY`) PEM.
    pub fn from_pem(pem: &str, key_pair_id: impl Into<String>) -> Result<Self, String> {
        let key = if pem.contains("BEGIN RSA PRIVATE KEY") {
            RsaPrivateKey::from_pkcs1_pem(pem).map_err(|e| e.to_string())?
        } else {
            RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| e.to_string())?
        };
        Ok(Self::new(key, key_pair_id))
    }

    pub fn key_pair_id(&self) -> &str {
        &self.key_pair_id
    }

    /// Raw PKCS#1 v1.5 / SHA-1 signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.key.sign(message).to_vec()
    }

    /// Sign `url` with a canned policy. Any query already on `url` is kept
    /// but is not covered by the signature.
    pub fn sign_canned_url(&self, url: &str, expires: i64) -> String {
        let resource = url.split(['?', '#']).next().unwrap_or(url);
        let signature = self.sign(canned_policy_string(resource, &expires.to_string()).as_bytes());
        let separator = if url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}={}&{}={}&{}={}",
            url,
            separator,
            EXPIRES,
            expires,
            SIGNATURE,
            encode_cloudfront_base64(&signature),
            KEY_PAIR_ID,
            self.encoded_key_pair_id(),
        )
    }

    /// Query string (without `?`) carrying a custom policy.
    pub fn custom_policy_query(&self, policy: &CustomPolicy) -> String {
        let document = policy.to_json();
        let signature = self.sign(document.as_bytes());
        format!(
            "{}={}&{}={}&{}={}",
            POLICY,
            encode_cloudfront_base64(document.as_bytes()),
            SIGNATURE,
            encode_cloudfront_base64(&signature),
            KEY_PAIR_ID,
            self.encoded_key_pair_id(),
        )
    }

    /// Cookie pairs granting `policy`.
    pub fn signed_cookies(&self, policy: &CustomPolicy) -> Vec<(&'static str, String)> {
        let document = policy.to_json();
        let signature = self.sign(document.as_bytes());
        vec![
            (COOKIE_POLICY, encode_cloudfront_base64(document.as_bytes())),
            (COOKIE_SIGNATURE, encode_cloudfront_base64(&signature)),
            (COOKIE_KEY_PAIR_ID, self.key_pair_id.clone()),
        ]
    }

    fn encoded_key_pair_id(&self) -> String {
        url::form_urlencoded::byte_serialize(self.key_pair_id.as_bytes()).collect()
    }
}
