//! HTTP transport backed by ureq
//!
//! ureq is a blocking client, so every request runs inside
//! `tokio::task::spawn_blocking`. Status handling is manual
//! (`http_status_as_error(false)`): 401/403 on the key endpoint and
//! 401/404 on run requests are meaningful to callers, not failures of
//! the transport itself.

use crate::config::Config;
use crate::error::{CagekitError, CagekitResult};
use crate::transport::{CageKeyResponse, RunResponse, Transport, HEADER_API_KEY};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use ureq::Agent;

/// Transport implementation over authenticated HTTPS
pub struct HttpTransport {
    agent: Agent,
    api_key: String,
    key_url: String,
    run_url: String,
}

impl HttpTransport {
    /// Create a transport from the client configuration
    pub fn new(config: &Config) -> Self {
        let agent_config = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.request_timeout))
            .build();

        Self {
            agent: Agent::new_with_config(agent_config),
            api_key: config.api_key.clone(),
            key_url: config.cage_key_url(),
            run_url: config.run_url.clone(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_cage_key(&self) -> CagekitResult<CageKeyResponse> {
        let agent = self.agent.clone();
        let url = self.key_url.clone();
        let api_key = self.api_key.clone();

        debug!("Fetching cage key from {}", url);

        let response = tokio::task::spawn_blocking(move || {
            let mut response = agent
                .get(&url)
                .header(HEADER_API_KEY, api_key.as_str())
                .call()
                .map_err(|e| CagekitError::transport(format!("fetching cage key: {}", e)))?;

            let status = response.status().as_u16();
            if status == 401 || status == 403 {
                return Err(CagekitError::KeyFetchUnauthorized { status });
            }
            if !(200..300).contains(&status) {
                return Err(CagekitError::UnexpectedStatus {
                    status,
                    context: "fetching cage key".to_string(),
                });
            }

            response
                .body_mut()
                .read_json::<CageKeyResponse>()
                .map_err(|e| CagekitError::MalformedResponse(format!("cage key body: {}", e)))
        })
        .await
        .map_err(|e| CagekitError::transport(format!("key fetch task failed: {}", e)))??;

        Ok(response)
    }

    async fn run_cage(
        &self,
        cage_name: &str,
        payload: &Value,
        headers: &[(String, String)],
    ) -> CagekitResult<RunResponse> {
        let agent = self.agent.clone();
        let url = format!("{}/{}", self.run_url, cage_name);
        let api_key = self.api_key.clone();
        let payload = payload.clone();
        let headers = headers.to_vec();

        debug!("Running cage at {}", url);

        let response = tokio::task::spawn_blocking(move || {
            let mut request = agent.post(&url).header(HEADER_API_KEY, api_key.as_str());
            for (name, value) in &headers {
                request = request.header(name.as_str(), value.as_str());
            }

            let mut response = request
                .send_json(&payload)
                .map_err(|e| CagekitError::transport(format!("running cage: {}", e)))?;

            let status = response.status().as_u16();
            let text = response
                .body_mut()
                .read_to_string()
                .map_err(|e| CagekitError::MalformedResponse(format!("run body: {}", e)))?;

            // Error bodies are not always JSON; carry them through as text
            let body = serde_json::from_str(&text).unwrap_or(Value::String(text));

            Ok::<_, CagekitError>(RunResponse { status, body })
        })
        .await
        .map_err(|e| CagekitError::transport(format!("run task failed: {}", e)))??;

        Ok(response)
    }
}
