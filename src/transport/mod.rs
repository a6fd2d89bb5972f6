//! Transport abstraction for the cage APIs
//!
//! Provides a trait for the two remote capabilities the client consumes
//! (key fetch, cage execution) so tests and embedders can substitute
//! their own transport. The default implementation is in [`http`].

pub mod http;

pub use http::HttpTransport;

use crate::error::CagekitResult;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

/// Header carrying the API key on every request
pub const HEADER_API_KEY: &str = "API-KEY";

/// Header pinning a run request to a deployed cage version
pub const HEADER_CAGE_VERSION: &str = "x-cage-version";

/// Response of the cage key endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CageKeyResponse {
    /// Public key material, typically base64 without PEM armor
    pub key: String,
}

/// Response of a cage run request.
///
/// Status codes are carried through rather than turned into errors here:
/// the caller decides whether 401/404 means a credential mismatch.
#[derive(Debug, Clone)]
pub struct RunResponse {
    /// HTTP status of the run request
    pub status: u16,

    /// Full response body
    pub body: Value,
}

impl RunResponse {
    /// The remote function's result payload, if the body carries one
    pub fn result(&self) -> Value {
        self.body.get("result").cloned().unwrap_or(Value::Null)
    }

    /// Whether the status indicates a credential or identity mismatch
    pub fn is_identity_mismatch(&self) -> bool {
        self.status == 401 || self.status == 404
    }
}

/// Authenticated HTTP capability consumed by the client
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the public key data is encrypted with before it crosses
    /// the trust boundary
    async fn get_cage_key(&self) -> CagekitResult<CageKeyResponse>;

    /// Execute a named cage with a JSON payload and extra headers
    async fn run_cage(
        &self,
        cage_name: &str,
        payload: &Value,
        headers: &[(String, String)],
    ) -> CagekitResult<RunResponse>;
}
