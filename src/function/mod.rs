//! Function identity for remote deployment
//!
//! A function is described by an explicit, serializable descriptor
//! rather than runtime reflection: its name, canonical source text,
//! ordered parameter names, and the environment bindings it needs at
//! runtime. Hashing the descriptor is a pure function, so the same
//! source always resolves to the same deployment identity.

pub mod environment;

pub use environment::{EnvironmentCollector, ProcessEnvCollector};

use crate::error::{CagekitError, CagekitResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Serializable description of a function to run remotely
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDescriptor {
    /// Function name; deployments are tracked per name
    pub name: String,

    /// Canonical source text of the function
    pub source: String,

    /// Ordered parameter names
    pub parameters: Vec<String>,

    /// Names of environment bindings the function reads at runtime
    pub required_bindings: Vec<String>,
}

impl FunctionDescriptor {
    /// Create a descriptor
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        parameters: Vec<String>,
        required_bindings: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            parameters,
            required_bindings,
        }
    }
}

/// Identity derived from a descriptor: what the deployment lock keys on
#[derive(Debug, Clone)]
pub struct FunctionIdentity {
    /// Content hash of the function source
    pub hash: String,

    /// Ordered parameter names
    pub parameters: Vec<String>,

    /// Environment bindings required at runtime
    pub required_bindings: Vec<String>,
}

/// Derives a deployment identity from a function descriptor
pub trait SourceAnalyzer: Send + Sync {
    /// Parse a descriptor into its deployment identity
    fn parse(&self, function: &FunctionDescriptor) -> CagekitResult<FunctionIdentity>;
}

/// Default analyzer: SHA-256 over the function source
pub struct DigestAnalyzer;

impl SourceAnalyzer for DigestAnalyzer {
    fn parse(&self, function: &FunctionDescriptor) -> CagekitResult<FunctionIdentity> {
        if function.name.trim().is_empty() {
            return Err(CagekitError::FunctionNameMissing);
        }

        let mut hasher = Sha256::new();
        hasher.update(function.source.as_bytes());
        let hash = hex::encode(hasher.finalize());

        Ok(FunctionIdentity {
            hash,
            parameters: function.parameters.clone(),
            required_bindings: function.required_bindings.clone(),
        })
    }
}
