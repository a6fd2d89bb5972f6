//! Runtime environment capture for wrapped functions
//!
//! Before each remote invocation the bindings a function needs are
//! collected locally, encrypted, and shipped alongside the call data.

use crate::error::CagekitResult;
use crate::function::FunctionDescriptor;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

/// Captures the environment bindings a function needs at runtime
#[async_trait]
pub trait EnvironmentCollector: Send + Sync {
    /// Collect bindings as a JSON object keyed by binding name
    async fn collect(&self, function: &FunctionDescriptor) -> CagekitResult<Value>;
}

/// Default collector: reads bindings from process environment variables.
///
/// Bindings not present in the environment are skipped, not errors —
/// the remote function decides whether it can run without them.
pub struct ProcessEnvCollector;

#[async_trait]
impl EnvironmentCollector for ProcessEnvCollector {
    async fn collect(&self, function: &FunctionDescriptor) -> CagekitResult<Value> {
        let mut bindings = Map::new();

        for name in &function.required_bindings {
            match std::env::var(name) {
                Ok(value) => {
                    bindings.insert(name.clone(), Value::String(value));
                }
                Err(_) => {
                    debug!("Binding {} not set, skipping", name);
                }
            }
        }

        Ok(Value::Object(bindings))
    }
}
