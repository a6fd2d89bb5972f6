//! Encryption provider seam and key material handling
//!
//! The encryption primitive itself lives outside this crate: embedders
//! supply a [`CryptoProvider`] when building the client. This module
//! owns the key material type, PEM normalization, and the lazy
//! [`KeyCache`](keycache::KeyCache) behind every encrypt call.

pub mod keycache;

pub use keycache::KeyCache;

use crate::error::{CagekitError, CagekitResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_FOOTER: &str = "-----END PUBLIC KEY-----";

/// Public key material a client encrypts against.
///
/// Fetched once per client and never refreshed; rebuild the client to
/// pick up rotated keys.
#[derive(Debug, Clone)]
pub struct CageKey {
    /// PEM-armored public key
    pub material: String,

    /// When the key was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CageKey {
    /// Normalize raw key material from the key endpoint into a usable key
    pub fn from_raw(raw: &str) -> CagekitResult<Self> {
        Ok(Self {
            material: format_key(raw)?,
            fetched_at: Utc::now(),
        })
    }
}

/// Options forwarded untouched to the encryption provider
#[derive(Debug, Clone, Default)]
pub struct EncryptOptions {
    /// Provider-specific settings
    pub extra: serde_json::Map<String, Value>,
}

/// The encryption transform applied before data crosses the trust
/// boundary.
///
/// Implementations must preserve the shape of their input: textual data
/// encrypts to a string, structured data to a structure, so an
/// encrypted payload still passes run-request validation.
#[async_trait]
pub trait CryptoProvider: Send + Sync {
    /// Encrypt `data` under `key`, passing `options` through unchanged
    async fn encrypt(
        &self,
        key: &CageKey,
        data: &Value,
        options: &EncryptOptions,
    ) -> CagekitResult<Value>;
}

/// Trim raw key material and wrap bare base64 in PEM armor
fn format_key(raw: &str) -> CagekitResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CagekitError::KeyMaterialInvalid);
    }

    if trimmed.starts_with(PEM_HEADER) {
        return Ok(trimmed.to_string());
    }

    Ok(format!("{}\n{}\n{}", PEM_HEADER, trimmed, PEM_FOOTER))
}
