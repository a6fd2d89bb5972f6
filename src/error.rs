//! Error types for cagekit
//!
//! All modules use `CagekitResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for cagekit operations
pub type CagekitResult<T> = Result<T, CagekitError>;

/// All errors that can occur in cagekit
#[derive(Error, Debug)]
pub enum CagekitError {
    // Initialization errors
    #[error("API key must be a non-empty string")]
    ApiKeyMissing,

    #[error("A CryptoProvider is required to build a client")]
    CryptoProviderMissing,

    // Validation errors
    #[error("Cage name must be a non-empty string")]
    CageNameInvalid,

    #[error("Cages must be given an object payload to run")]
    PayloadNotObject,

    #[error("Cannot encrypt null data")]
    EncryptDataNull,

    #[error("Function descriptor must carry a non-empty name")]
    FunctionNameMissing,

    // Authorization errors
    #[error("API key rejected while fetching the cage key (status {status})")]
    KeyFetchUnauthorized { status: u16 },

    #[error("Cage run rejected for '{cage}' (status {status})")]
    RunUnauthorized { cage: String, status: u16 },

    #[error(
        "API key mismatch running '{cage}': ensure you have switched to your app's team in the CLI"
    )]
    IdentityMismatch { cage: String },

    // Transport errors
    #[error("Cage API request failed: {context}")]
    Transport { context: String },

    #[error("Unexpected status {status} from cage API while {context}")]
    UnexpectedStatus { status: u16, context: String },

    #[error("Malformed response from cage API: {0}")]
    MalformedResponse(String),

    #[error("Cage key material is empty or unusable")]
    KeyMaterialInvalid,

    // Deployment errors
    #[error("Deployment failed for cage '{cage}': {reason}")]
    DeployFailed { cage: String, reason: String },

    #[error("Deploy command failed to start: {command}")]
    DeployCommand {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Deploy command produced an unreadable receipt: {0}")]
    DeployReceiptInvalid(String),

    // Lock store errors
    #[error("Failed to read cage lockfile {path}: {reason}")]
    LockRead { path: PathBuf, reason: String },

    #[error("Failed to write cage lockfile {path}: {reason}")]
    LockWrite { path: PathBuf, reason: String },

    #[error("Lock entry for '{0}' missing after write")]
    LockEntryMissing(String),

    // Crypto provider errors
    #[error("Encryption provider error: {0}")]
    Crypto(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CagekitError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a transport error with context
    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
        }
    }

    /// Check if the error is a credential/identity mismatch
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Self::KeyFetchUnauthorized { .. }
                | Self::RunUnauthorized { .. }
                | Self::IdentityMismatch { .. }
        )
    }

    /// Check if the error was raised by argument validation, before any I/O
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::CageNameInvalid
                | Self::PayloadNotObject
                | Self::EncryptDataNull
                | Self::FunctionNameMissing
        )
    }
}
