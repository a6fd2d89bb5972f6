//! Lazy, single-flight cage key cache
//!
//! One cached key per client. The first encrypt call triggers the
//! fetch; concurrent callers await the same pending initialization
//! instead of issuing duplicate requests. A failed fetch caches
//! nothing, so the next call retries. There is no refresh path: the
//! key lives for the lifetime of the client.

use crate::crypto::CageKey;
use crate::error::CagekitResult;
use crate::transport::Transport;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Single-flight cache for the cage key
pub struct KeyCache {
    key: OnceCell<CageKey>,
}

impl KeyCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            key: OnceCell::new(),
        }
    }

    /// Return the cached key, fetching it on first use.
    ///
    /// `OnceCell` serializes initialization: at most one fetch is in
    /// flight, waiters observe the same resolved key, and an error
    /// leaves the cell empty.
    pub async fn get_or_fetch(&self, transport: &dyn Transport) -> CagekitResult<&CageKey> {
        self.key
            .get_or_try_init(|| async {
                debug!("No cage key cached, fetching");
                let response = transport.get_cage_key().await?;
                let key = CageKey::from_raw(&response.key)?;
                info!("Cage key fetched and cached");
                Ok(key)
            })
            .await
    }

    /// The cached key, if one has been installed
    pub fn cached(&self) -> Option<&CageKey> {
        self.key.get()
    }
}

impl Default for KeyCache {
    fn default() -> Self {
        Self::new()
    }
}
