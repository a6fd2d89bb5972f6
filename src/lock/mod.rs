//! Deployment lock: hash-keyed version resolution
//!
//! Decides whether a function needs a fresh remote deployment. A
//! function's recorded version changes only when its source hash
//! changes; resolving an unchanged hash is a pure lookup with no
//! deployment and no network.

pub mod store;

pub use store::{CageLockEntry, FileLockStore, LockStore};

use crate::deploy::DeploymentReceipt;
use crate::error::{CagekitError, CagekitResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Resolves function hashes to pinned deployment versions
pub struct DeploymentLock {
    store: Arc<dyn LockStore>,
    // Serializes check -> deploy -> persist so one deployment happens
    // per (function, hash) within this process
    guard: Mutex<()>,
}

impl DeploymentLock {
    /// Create a lock over the given store
    pub fn new(store: Arc<dyn LockStore>) -> Self {
        Self {
            store,
            guard: Mutex::new(()),
        }
    }

    /// Resolve the deployed version for `function_name` at `source_hash`.
    ///
    /// Deploys via `deploy` when no entry exists or the recorded hash
    /// differs; an entry with a matching hash short-circuits without
    /// any remote call. The returned version is always the one the
    /// store records after the write, so concurrent resolvers converge.
    /// Deploy and store failures propagate unmodified: without a
    /// durable record there is no version to pin.
    pub async fn resolve<F, Fut>(
        &self,
        function_name: &str,
        source_hash: &str,
        deploy: F,
    ) -> CagekitResult<u64>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = CagekitResult<DeploymentReceipt>>,
    {
        let _guard = self.guard.lock().await;

        if let Some(entry) = self.store.get(function_name).await? {
            if entry.source_hash == source_hash {
                debug!(
                    "Source unchanged for {}, reusing version {}",
                    function_name, entry.version
                );
                return Ok(entry.version);
            }
        }

        let receipt = deploy().await?;
        info!(
            "Deployed {} as version {}",
            function_name, receipt.deployed_version
        );

        let entry = CageLockEntry {
            function_name: function_name.to_string(),
            source_hash: source_hash.to_string(),
            version: receipt.deployed_version,
            deployed_by: receipt.deployed_by,
            deployed_team: receipt.deployed_team,
        };
        self.store.put(&entry).await?;

        let recorded = self
            .store
            .get(function_name)
            .await?
            .ok_or_else(|| CagekitError::LockEntryMissing(function_name.to_string()))?;

        Ok(recorded.version)
    }
}
