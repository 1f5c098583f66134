//! Public key store for signed URL verification.
//!
//! # Responsibilities
//! - Load RSA public keys (SPKI or PKCS#1 PEM) indexed by key pair id
//! - Exact-id lookup; an unknown id is reported distinctly from a bad signature
//!
//! # Design Decisions
//! - Loaded once per config snapshot, never mutated afterwards
//! - Any unreadable key is fatal for the snapshot being built

use std::collections::HashMap;
use std::fs;

use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::VerifyingKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use sha1::Sha1;
use thiserror::Error;

use crate::config::{KeyConfig, SigningConfig};

/// Key material could not be loaded.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key {key_pair_id}: failed to read {path}: {source}")]
    Read {
        key_pair_id: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("key {key_pair_id}: not a usable RSA public key: {reason}")]
    Parse { key_pair_id: String, reason: String },

    #[error("key {0}: no key material configured")]
    Missing(String),

    #[error("duplicate key pair id {0}")]
    Duplicate(String),
}

/// Parse an RSA public key from PEM, accepting `PUBLIC KEY` and `RSA PUBLIC KEY` blocks.
pub fn parse_public_key_pem(pem: &str) -> Result<RsaPublicKey, String> {
    if pem.contains("BEGIN RSA PUBLIC KEY") {
        RsaPublicKey::from_pkcs1_pem(pem).map_err(|e| e.to_string())
    } else {
        RsaPublicKey::from_public_key_pem(pem).map_err(|e| e.to_string())
    }
}

/// Verifying keys indexed by key pair id.
#[derive(Default)]
pub struct KeyStore {
    keys: HashMap<String, VerifyingKey<Sha1>>,
}

impl KeyStore {
    /// Load every key named by the signing config.
    pub fn load(signing: &SigningConfig) -> Result<Self, KeyError> {
        let mut store = Self::default();
        for entry in signing.all_keys() {
            store.load_entry(&entry)?;
        }
        Ok(store)
    }

    fn load_entry(&mut self, entry: &KeyConfig) -> Result<(), KeyError> {
        let pem = match (&entry.public_key_path, &entry.public_key_pem) {
            (Some(path), _) => fs::read_to_string(path).map_err(|source| KeyError::Read {
                key_pair_id: entry.key_pair_id.clone(),
                path: path.clone(),
                source,
            })?,
            (None, Some(pem)) => pem.clone(),
            (None, None) => return Err(KeyError::Missing(entry.key_pair_id.clone())),
        };
        self.insert_pem(&entry.key_pair_id, &pem)
    }

    /// Register a PEM-encoded public key under `key_pair_id`.
    pub fn insert_pem(&mut self, key_pair_id: &str, pem: &str) -> Result<(), KeyError> {
        let key = parse_public_key_pem(pem).map_err(|reason| KeyError::Parse {
            key_pair_id: key_pair_id.to_string(),
            reason,
        })?;
        self.insert(key_pair_id, key)
    }

    /// Register an already-parsed public key.
    pub fn insert(&mut self, key_pair_id: &str, key: RsaPublicKey) -> Result<(), KeyError> {
        if self.keys.contains_key(key_pair_id) {
            return Err(KeyError::Duplicate(key_pair_id.to_string()));
        }
        self.keys
            .insert(key_pair_id.to_string(), VerifyingKey::<Sha1>::new(key));
        Ok(())
    }

    /// Look up a verifying key by exact id.
    pub fn get(&self, key_pair_id: &str) -> Option<&VerifyingKey<Sha1>> {
        self.keys.get(key_pair_id)
    }

    pub fn key_pair_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl std::fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("key_pair_ids", &self.keys.keys().collect::<Vec<_>>())
            .finish()
    }
}
