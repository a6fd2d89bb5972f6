//! Remotely-executing wrapped functions
//!
//! A [`CagedFunction`] is what `cagify` hands back: a callable pinned
//! to the deployment version resolved when it was created. Later lock
//! updates for the same function never change an existing callable.

use crate::crypto::EncryptOptions;
use crate::error::{CagekitError, CagekitResult};
use crate::function::{EnvironmentCollector, FunctionDescriptor, FunctionIdentity};
use crate::transport::{Transport, HEADER_CAGE_VERSION};
use crate::Client;
use serde_json::{json, Map, Value};
use tracing::debug;

/// A wrapped function executing remotely under a pinned version
#[derive(Debug)]
pub struct CagedFunction {
    client: Client,
    cage_name: String,
    function: FunctionDescriptor,
    identity: FunctionIdentity,
    version: u64,
}

impl CagedFunction {
    pub(crate) fn new(
        client: Client,
        cage_name: String,
        function: FunctionDescriptor,
        identity: FunctionIdentity,
        version: u64,
    ) -> Self {
        Self {
            client,
            cage_name,
            function,
            identity,
            version,
        }
    }

    /// The deployment version every call is pinned to
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The cage this function executes in
    pub fn cage_name(&self) -> &str {
        &self.cage_name
    }

    /// Invoke the function remotely with positional arguments.
    ///
    /// Arguments map to parameter names by index: extra arguments are
    /// dropped, missing ones leave their keys unset. The function's
    /// required environment bindings are collected and encrypted on
    /// every call.
    pub async fn call(&self, args: &[Value]) -> CagekitResult<Value> {
        let mut data = Map::new();
        for (index, name) in self.identity.parameters.iter().enumerate() {
            if let Some(value) = args.get(index) {
                data.insert(name.clone(), value.clone());
            }
        }

        let bindings = self
            .client
            .environment_collector()
            .collect(&self.function)
            .await?;
        let environment = self
            .client
            .encrypt(&bindings, &EncryptOptions::default())
            .await?;

        let payload = json!({
            "environment": environment,
            "data": Value::Object(data),
        });
        let headers = vec![(HEADER_CAGE_VERSION.to_string(), self.version.to_string())];

        debug!(
            "Invoking cage {} at version {}",
            self.cage_name, self.version
        );

        let response = self
            .client
            .transport()
            .run_cage(&self.cage_name, &payload, &headers)
            .await?;

        if response.is_identity_mismatch() {
            return Err(CagekitError::IdentityMismatch {
                cage: self.cage_name.clone(),
            });
        }

        Ok(response.result())
    }
}
