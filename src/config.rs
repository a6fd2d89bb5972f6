//! Client configuration
//!
//! Built from an API key plus defaulted endpoints. Endpoint URLs can be
//! overridden with `CAGEKIT_API_URL` and `CAGEKIT_RUN_URL`.

use crate::error::{CagekitError, CagekitResult};
use std::path::PathBuf;
use std::time::Duration;

/// Default base URL for the cage management API
pub const DEFAULT_API_URL: &str = "https://api.cagekit.dev";

/// Default base URL for cage execution
pub const DEFAULT_RUN_URL: &str = "https://run.cagekit.dev";

/// Lockfile recording deployed function versions, relative to the
/// working directory
pub const DEFAULT_LOCKFILE: &str = "cage-lock.json";

/// Environment variable overriding the management API URL
pub const ENV_API_URL: &str = "CAGEKIT_API_URL";

/// Environment variable overriding the run URL
pub const ENV_RUN_URL: &str = "CAGEKIT_RUN_URL";

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API key presented on every request
    pub api_key: String,

    /// Base URL for the management API (key fetch)
    pub api_url: String,

    /// Base URL for cage execution
    pub run_url: String,

    /// Per-request timeout applied by the default transport
    pub request_timeout: Duration,

    /// Path of the cage lockfile used by the default lock store
    pub lockfile_path: PathBuf,

    /// Binary invoked by the default deploy invoker
    pub deploy_binary: String,
}

impl Config {
    /// Build a configuration from an API key, applying defaults and
    /// environment overrides
    pub fn new(api_key: impl Into<String>) -> CagekitResult<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CagekitError::ApiKeyMissing);
        }

        Ok(Self {
            api_key,
            api_url: env_or(ENV_API_URL, DEFAULT_API_URL),
            run_url: env_or(ENV_RUN_URL, DEFAULT_RUN_URL),
            request_timeout: Duration::from_secs(30),
            lockfile_path: PathBuf::from(DEFAULT_LOCKFILE),
            deploy_binary: "cage".to_string(),
        })
    }

    /// URL of the cage key endpoint
    pub fn cage_key_url(&self) -> String {
        format!("{}/cages/key", self.api_url)
    }

    /// URL a named cage is executed at
    pub fn cage_run_url(&self, cage_name: &str) -> String {
        format!("{}/{}", self.run_url, cage_name)
    }
}

/// Read an environment override, falling back to the default when unset
/// or blank
fn env_or(var: &str, default: &str) -> String {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => value.trim().trim_end_matches('/').to_string(),
        _ => default.to_string(),
    }
}
