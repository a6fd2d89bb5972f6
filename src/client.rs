//! The cagekit client
//!
//! A [`Client`] is a cheap-clone handle over shared state: one cached
//! cage key, one deployment lock, one set of collaborators. Build it
//! once per process and clone freely across tasks.

use crate::config::Config;
use crate::crypto::{CryptoProvider, EncryptOptions, KeyCache};
use crate::datatypes;
use crate::deploy::{CliDeployInvoker, DeployInvoker};
use crate::error::{CagekitError, CagekitResult};
use crate::function::{
    DigestAnalyzer, EnvironmentCollector, FunctionDescriptor, ProcessEnvCollector, SourceAnalyzer,
};
use crate::labs::Labs;
use crate::lock::{DeploymentLock, FileLockStore, LockStore};
use crate::runner::CagedFunction;
use crate::transport::{HttpTransport, Transport, HEADER_CAGE_VERSION};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Options for a cage run request
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Pin the request to a specific deployed version
    pub version: Option<u64>,
}

impl RunOptions {
    fn headers(&self) -> Vec<(String, String)> {
        match self.version {
            Some(version) => vec![(HEADER_CAGE_VERSION.to_string(), version.to_string())],
            None => Vec::new(),
        }
    }
}

struct ClientInner {
    config: Config,
    transport: Arc<dyn Transport>,
    crypto: Arc<dyn CryptoProvider>,
    analyzer: Arc<dyn SourceAnalyzer>,
    environment: Arc<dyn EnvironmentCollector>,
    deployer: Arc<dyn DeployInvoker>,
    lock: DeploymentLock,
    key_cache: KeyCache,
}

/// Client for encrypting data and running cages
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Start building a client for the given API key
    pub fn builder(api_key: impl Into<String>) -> ClientBuilder {
        ClientBuilder::new(api_key)
    }

    /// The client configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Encrypt data with the cage key, fetching the key on first use.
    ///
    /// Concurrent callers share a single in-flight key fetch; a failed
    /// fetch caches nothing and the next call retries.
    pub async fn encrypt(&self, data: &Value, options: &EncryptOptions) -> CagekitResult<Value> {
        if !datatypes::is_defined(data) {
            return Err(CagekitError::EncryptDataNull);
        }

        let key = self
            .inner
            .key_cache
            .get_or_fetch(self.inner.transport.as_ref())
            .await?;

        self.inner.crypto.encrypt(key, data, options).await
    }

    /// Run a named cage with a strict object payload.
    ///
    /// Validation happens before any I/O; a 401/404 response surfaces
    /// as an authorization error rather than a payload.
    pub async fn run(
        &self,
        cage_name: &str,
        payload: &Value,
        options: &RunOptions,
    ) -> CagekitResult<Value> {
        validate_cage_name(cage_name)?;
        if !datatypes::is_object_strict(payload) {
            return Err(CagekitError::PayloadNotObject);
        }

        let headers = options.headers();
        let response = self
            .inner
            .transport
            .run_cage(cage_name, payload, &headers)
            .await?;

        if response.is_identity_mismatch() {
            return Err(CagekitError::RunUnauthorized {
                cage: cage_name.to_string(),
                status: response.status,
            });
        }

        Ok(response.body)
    }

    /// Encrypt data, then run the cage with the encrypted payload.
    ///
    /// Strictly sequential: a run failure after a successful encrypt is
    /// not retried.
    pub async fn encrypt_and_run(
        &self,
        cage_name: &str,
        data: &Value,
        options: &EncryptOptions,
    ) -> CagekitResult<Value> {
        validate_cage_name(cage_name)?;
        if !datatypes::is_object_strict(data) {
            return Err(CagekitError::PayloadNotObject);
        }

        let payload = self.encrypt(data, options).await?;
        self.run(cage_name, &payload, &RunOptions::default()).await
    }

    /// Wrap a function descriptor into a remotely-executing callable.
    ///
    /// Resolves a pinned version through the deployment lock, deploying
    /// only when the function's source hash has changed. Re-wrapping
    /// unchanged source never redeploys.
    pub async fn cagify(
        &self,
        cage_name: &str,
        function: &FunctionDescriptor,
    ) -> CagekitResult<CagedFunction> {
        validate_cage_name(cage_name)?;

        let identity = self.inner.analyzer.parse(function)?;
        debug!("Resolving {} at hash {}", function.name, identity.hash);

        let version = self
            .inner
            .lock
            .resolve(&function.name, &identity.hash, || async {
                self.inner
                    .deployer
                    .deploy(
                        cage_name,
                        function,
                        &identity.parameters,
                        &identity.required_bindings,
                    )
                    .await
            })
            .await?;

        Ok(CagedFunction::new(
            self.clone(),
            cage_name.to_string(),
            function.clone(),
            identity,
            version,
        ))
    }

    /// Experimental capability surface
    pub fn labs(&self) -> Labs {
        Labs::new(self.clone())
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    pub(crate) fn environment_collector(&self) -> &dyn EnvironmentCollector {
        self.inner.environment.as_ref()
    }
}

fn validate_cage_name(cage_name: &str) -> CagekitResult<()> {
    if cage_name.trim().is_empty() {
        return Err(CagekitError::CageNameInvalid);
    }
    Ok(())
}

/// Builder assembling a client from collaborators.
///
/// Everything defaults except the crypto provider: the encryption
/// primitive lives outside this crate and must be supplied.
pub struct ClientBuilder {
    api_key: String,
    transport: Option<Arc<dyn Transport>>,
    crypto: Option<Arc<dyn CryptoProvider>>,
    analyzer: Option<Arc<dyn SourceAnalyzer>>,
    environment: Option<Arc<dyn EnvironmentCollector>>,
    deployer: Option<Arc<dyn DeployInvoker>>,
    lock_store: Option<Arc<dyn LockStore>>,
}

impl ClientBuilder {
    /// Create a builder for the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            transport: None,
            crypto: None,
            analyzer: None,
            environment: None,
            deployer: None,
            lock_store: None,
        }
    }

    /// Supply the encryption provider (required)
    pub fn crypto(mut self, crypto: Arc<dyn CryptoProvider>) -> Self {
        self.crypto = Some(crypto);
        self
    }

    /// Replace the HTTP transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the source analyzer
    pub fn analyzer(mut self, analyzer: Arc<dyn SourceAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    /// Replace the environment collector
    pub fn environment(mut self, environment: Arc<dyn EnvironmentCollector>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Replace the deploy invoker
    pub fn deployer(mut self, deployer: Arc<dyn DeployInvoker>) -> Self {
        self.deployer = Some(deployer);
        self
    }

    /// Replace the lock store
    pub fn lock_store(mut self, lock_store: Arc<dyn LockStore>) -> Self {
        self.lock_store = Some(lock_store);
        self
    }

    /// Build the client, validating construction input
    pub fn build(self) -> CagekitResult<Client> {
        let config = Config::new(self.api_key)?;
        let crypto = self.crypto.ok_or(CagekitError::CryptoProviderMissing)?;

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new(&config)));
        let analyzer = self.analyzer.unwrap_or_else(|| Arc::new(DigestAnalyzer));
        let environment = self
            .environment
            .unwrap_or_else(|| Arc::new(ProcessEnvCollector));
        let deployer = self
            .deployer
            .unwrap_or_else(|| Arc::new(CliDeployInvoker::new(config.deploy_binary.clone())));
        let lock_store = self
            .lock_store
            .unwrap_or_else(|| Arc::new(FileLockStore::new(config.lockfile_path.clone())));

        Ok(Client {
            inner: Arc::new(ClientInner {
                config,
                transport,
                crypto,
                analyzer,
                environment,
                deployer,
                lock: DeploymentLock::new(lock_store),
                key_cache: KeyCache::new(),
            }),
        })
    }
}
