//! Remote deployment invocation
//!
//! Materializing a new cage deployment is delegated to the vendor CLI:
//! the function descriptor is streamed over stdin and the CLI answers
//! with a JSON receipt on stdout.

use crate::error::{CagekitError, CagekitResult};
use crate::function::FunctionDescriptor;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Receipt returned by a successful deployment
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentReceipt {
    /// User that performed the deployment
    pub deployed_by: String,

    /// Team the deployment belongs to
    pub deployed_team: String,

    /// Version assigned to the deployment
    pub deployed_version: u64,
}

/// Materializes a remote deployment for a wrapped function
#[async_trait]
pub trait DeployInvoker: Send + Sync {
    /// Deploy `function` as `cage_name`, returning the receipt
    async fn deploy(
        &self,
        cage_name: &str,
        function: &FunctionDescriptor,
        parameters: &[String],
        required_bindings: &[String],
    ) -> CagekitResult<DeploymentReceipt>;
}

/// Deploy invoker backed by the vendor CLI
pub struct CliDeployInvoker {
    binary: String,
}

impl CliDeployInvoker {
    /// Create an invoker using the given CLI binary
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl DeployInvoker for CliDeployInvoker {
    async fn deploy(
        &self,
        cage_name: &str,
        function: &FunctionDescriptor,
        parameters: &[String],
        required_bindings: &[String],
    ) -> CagekitResult<DeploymentReceipt> {
        info!("Deploying cage {} via {}", cage_name, self.binary);

        let request = json!({
            "function": function,
            "parameters": parameters,
            "requiredBindings": required_bindings,
        });

        let mut child = Command::new(&self.binary)
            .args(["deploy", cage_name, "--json"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CagekitError::DeployCommand {
                command: format!("{} deploy {}", self.binary, cage_name),
                source: e,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            let body = serde_json::to_vec(&request)?;
            stdin
                .write_all(&body)
                .await
                .map_err(|e| CagekitError::io("writing deploy request", e))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CagekitError::io("waiting for deploy command", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CagekitError::DeployFailed {
                cage: cage_name.to_string(),
                reason: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        debug!("Deploy receipt: {}", stdout.trim());

        serde_json::from_str(stdout.trim())
            .map_err(|e| CagekitError::DeployReceiptInvalid(e.to_string()))
    }
}
