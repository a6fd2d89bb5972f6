//! Durable lock storage
//!
//! The default store is a JSON lockfile in the project directory,
//! mapping function names to their deployed hash and version. Reads
//! and writes go through `tokio::fs`; the whole file is rewritten on
//! every update.

use crate::error::{CagekitError, CagekitResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;

/// One recorded deployment per function name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CageLockEntry {
    /// Function the entry belongs to
    pub function_name: String,

    /// Content hash of the deployed source
    pub source_hash: String,

    /// Version assigned by the deployment
    pub version: u64,

    /// User that performed the deployment
    pub deployed_by: String,

    /// Team the deployment belongs to
    pub deployed_team: String,
}

/// Durable map of function name to lock entry
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Look up the entry for a function
    async fn get(&self, function_name: &str) -> CagekitResult<Option<CageLockEntry>>;

    /// Record an entry, replacing any previous one for the same function
    async fn put(&self, entry: &CageLockEntry) -> CagekitResult<()>;
}

/// Lock store backed by a JSON lockfile.
///
/// Whole-file read/modify/write without compare-and-swap: two processes
/// resolving the same new hash may both deploy, and the last write
/// wins. Entries written by concurrent resolvers of the same source are
/// equivalent, so the recorded version stays authoritative.
pub struct FileLockStore {
    path: PathBuf,
}

impl FileLockStore {
    /// Create a store writing to the given lockfile path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_all(&self) -> CagekitResult<BTreeMap<String, CageLockEntry>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }

        let content =
            fs::read_to_string(&self.path)
                .await
                .map_err(|e| CagekitError::LockRead {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })?;

        serde_json::from_str(&content).map_err(|e| CagekitError::LockRead {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    async fn write_all(&self, entries: &BTreeMap<String, CageLockEntry>) -> CagekitResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .await
                    .map_err(|e| CagekitError::LockWrite {
                        path: self.path.clone(),
                        reason: e.to_string(),
                    })?;
            }
        }

        let content = serde_json::to_string_pretty(entries)?;
        fs::write(&self.path, content)
            .await
            .map_err(|e| CagekitError::LockWrite {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl LockStore for FileLockStore {
    async fn get(&self, function_name: &str) -> CagekitResult<Option<CageLockEntry>> {
        let entries = self.read_all().await?;
        Ok(entries.get(function_name).cloned())
    }

    async fn put(&self, entry: &CageLockEntry) -> CagekitResult<()> {
        let mut entries = self.read_all().await?;
        entries.insert(entry.function_name.clone(), entry.clone());
        self.write_all(&entries).await
    }
}
