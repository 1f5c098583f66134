//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate origin URLs and path patterns
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check signing requirements have key material
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Key files are not read here; that happens when the key store loads

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::ProxyConfig;
use crate::routing::matcher::PathPattern;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid server.bind_address {0:?}")]
    BindAddress(String),

    #[error("server.health_path must start with '/', got {0:?}")]
    HealthPath(String),

    #[error("origin #{0}: name is required")]
    MissingOriginName(usize),

    #[error("origin {0}: duplicate name")]
    DuplicateOriginName(String),

    #[error("origin {name}: invalid url {url:?}: {reason}")]
    OriginUrl { name: String, url: String, reason: String },

    #[error("origin {0}: at least one path pattern is required")]
    NoPathPatterns(String),

    #[error("origin {name}: {reason}")]
    PathPattern { name: String, reason: String },

    #[error("upstream.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("signing.public_base_url {url:?}: {reason}")]
    PublicBaseUrl { url: String, reason: String },

    #[error("signing.public_key_path is required with signing.key_pair_id")]
    ShorthandKeyWithoutPath,

    #[error("signing key #{0}: key_pair_id is required")]
    MissingKeyPairId(usize),

    #[error("signing key {0}: duplicate key_pair_id")]
    DuplicateKeyPairId(String),

    #[error("signing key {0}: one of public_key_path or public_key_pem is required")]
    MissingKeyMaterial(String),

    #[error("origin {0} requires signatures but no signing keys are configured")]
    SignatureWithoutKeys(String),
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.server.bind_address.clone()));
    }
    if !config.server.health_path.starts_with('/') {
        errors.push(ValidationError::HealthPath(config.server.health_path.clone()));
    }

    if config.upstream.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_timeout_secs"));
    }
    if config.upstream.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_timeout_secs"));
    }

    validate_origins(config, &mut errors);
    validate_signing(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_origins(config: &ProxyConfig, errors: &mut Vec<ValidationError>) {
    let mut seen = HashSet::new();

    for (index, origin) in config.origins.iter().enumerate() {
        if origin.name.is_empty() {
            errors.push(ValidationError::MissingOriginName(index));
        } else if !seen.insert(origin.name.as_str()) {
            errors.push(ValidationError::DuplicateOriginName(origin.name.clone()));
        }

        match Url::parse(&origin.url) {
            Ok(url) if !matches!(url.scheme(), "http" | "https") => errors.push(ValidationError::OriginUrl {
                name: origin.name.clone(),
                url: origin.url.clone(),
                reason: format!("unsupported scheme {:?}", url.scheme()),
            }),
            Ok(url) if url.host_str().is_none() => errors.push(ValidationError::OriginUrl {
                name: origin.name.clone(),
                url: origin.url.clone(),
                reason: "missing host".to_string(),
            }),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::OriginUrl {
                name: origin.name.clone(),
                url: origin.url.clone(),
                reason: e.to_string(),
            }),
        }

        if origin.path_patterns.is_empty() {
            errors.push(ValidationError::NoPathPatterns(origin.name.clone()));
        }
        for pattern in &origin.path_patterns {
            if let Err(e) = PathPattern::parse(pattern) {
                errors.push(ValidationError::PathPattern {
                    name: origin.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

fn validate_signing(config: &ProxyConfig, errors: &mut Vec<ValidationError>) {
    let signing = &config.signing;

    if let Some(base) = &signing.public_base_url {
        match Url::parse(base) {
            Ok(url) if url.query().is_some() || url.fragment().is_some() => {
                errors.push(ValidationError::PublicBaseUrl {
                    url: base.clone(),
                    reason: "must not carry a query or fragment".to_string(),
                })
            }
            Ok(url) if url.host_str().is_none() => errors.push(ValidationError::PublicBaseUrl {
                url: base.clone(),
                reason: "missing host".to_string(),
            }),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::PublicBaseUrl {
                url: base.clone(),
                reason: e.to_string(),
            }),
        }
    }

    if signing.key_pair_id.is_some() && signing.public_key_path.is_none() {
        errors.push(ValidationError::ShorthandKeyWithoutPath);
    }

    let keys = signing.all_keys();
    let mut seen = HashSet::new();
    for (index, key) in keys.iter().enumerate() {
        if key.key_pair_id.is_empty() {
            errors.push(ValidationError::MissingKeyPairId(index));
            continue;
        }
        if !seen.insert(key.key_pair_id.as_str()) {
            errors.push(ValidationError::DuplicateKeyPairId(key.key_pair_id.clone()));
        }
        if key.public_key_path.is_none() && key.public_key_pem.is_none() {
            errors.push(ValidationError::MissingKeyMaterial(key.key_pair_id.clone()));
        }
    }

    if keys.is_empty() {
        for origin in &config.origins {
            if origin.require_signature.unwrap_or(signing.enabled) {
                errors.push(ValidationError::SignatureWithoutKeys(origin.name.clone()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{KeyConfig, OriginConfig};

    fn origin(name: &str, url: &str, patterns: &[&str]) -> OriginConfig {
        OriginConfig {
            name: name.to_string(),
            url: url.to_string(),
            path_patterns: patterns.iter().map(|p| p.to_string()).collect(),
            require_signature: None,
            strip_prefix: None,
            target_prefix: None,
            default_root_object: None,
            strip_signature_params: false,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ProxyConfig::default()).is_ok());
    }

    #[test]
    fn test_https_origins_are_accepted() {
        let mut config = ProxyConfig::default();
        config.origins.push(origin("s3", "https://bucket.s3.amazonaws.com", &["/*"]));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = ProxyConfig::default();
        config.server.bind_address = "not-an-address".into();
        config.upstream.request_timeout_secs = 0;
        config.origins.push(origin("a", "ftp://files", &["/a/*"]));
        config.origins.push(origin("a", "http://127.0.0.1:9000", &[]));
        config.origins.push(origin("b", "http://127.0.0.1:9000", &["/b/*/c"]));

        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::BindAddress("not-an-address".into())));
        assert!(errors.contains(&ValidationError::ZeroTimeout("request_timeout_secs")));
        assert!(errors.contains(&ValidationError::DuplicateOriginName("a".into())));
        assert!(errors.contains(&ValidationError::NoPathPatterns("a".into())));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::OriginUrl { name, .. } if name == "a")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::PathPattern { name, .. } if name == "b")));
    }

    #[test]
    fn test_signature_requirement_needs_keys() {
        let mut config = ProxyConfig::default();
        let mut private = origin("private", "http://127.0.0.1:9000", &["/private/*"]);
        private.require_signature = Some(true);
        config.origins.push(private);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::SignatureWithoutKeys("private".into())]);

        config.signing.keys.push(KeyConfig {
            key_pair_id: "K1".into(),
            public_key_path: Some("public.pem".into()),
            public_key_pem: None,
        });
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_global_signing_applies_to_unset_origins() {
        let mut config = ProxyConfig::default();
        config.signing.enabled = true;
        let mut public = origin("public", "http://127.0.0.1:9000", &["/public/*"]);
        public.require_signature = Some(false);
        config.origins.push(public);
        assert!(validate_config(&config).is_ok());

        config.origins.push(origin("rest", "http://127.0.0.1:9000", &["/*"]));
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::SignatureWithoutKeys("rest".into())]);
    }

    #[test]
    fn test_public_base_url_must_be_bare() {
        let mut config = ProxyConfig::default();
        config.signing.public_base_url = Some("https://cdn.example.com/?x=1".into());
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(errors[0], ValidationError::PublicBaseUrl { .. }));
    }
}
