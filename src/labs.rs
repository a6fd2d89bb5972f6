//! Experimental capabilities
//!
//! Delivered as an explicit struct built from a client handle, so the
//! client surface itself never changes shape at runtime.

use crate::client::RunOptions;
use crate::error::CagekitResult;
use crate::Client;
use serde_json::{json, Value};

/// Cage that proxies outbound HTTP requests
pub const PROXY_CAGE: &str = "proxy-cage";

/// Experimental capability surface, composed over a client
pub struct Labs {
    client: Client,
}

impl Labs {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Fetch a URL through the proxy cage, returning the remote result
    pub async fn fetch(&self, url: &str, options: &Value) -> CagekitResult<Value> {
        let payload = json!({
            "url": url,
            "options": options,
        });

        let body = self
            .client
            .run(PROXY_CAGE, &payload, &RunOptions::default())
            .await?;

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}
