//! Integration tests for cagekit
//!
//! Exercises the client end-to-end against mock collaborators and a
//! real lockfile-backed store in a temp directory.

mod support {
    use async_trait::async_trait;
    use cagekit::crypto::{CageKey, CryptoProvider, EncryptOptions};
    use cagekit::deploy::{DeployInvoker, DeploymentReceipt};
    use cagekit::error::{CagekitError, CagekitResult};
    use cagekit::function::{EnvironmentCollector, FunctionDescriptor};
    use cagekit::transport::{CageKeyResponse, RunResponse, Transport};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Shared call journal so tests can assert ordering across collaborators
    pub type Journal = Arc<Mutex<Vec<String>>>;

    pub fn journal() -> Journal {
        Arc::new(Mutex::new(Vec::new()))
    }

    pub struct MockTransport {
        pub key_fetches: AtomicUsize,
        pub key_status: u16,
        pub run_status: u16,
        pub runs: Mutex<Vec<(String, Value, Vec<(String, String)>)>>,
        pub journal: Journal,
    }

    impl MockTransport {
        pub fn new(journal: Journal) -> Self {
            Self {
                key_fetches: AtomicUsize::new(0),
                key_status: 200,
                run_status: 200,
                runs: Mutex::new(Vec::new()),
                journal,
            }
        }

        pub fn with_key_status(journal: Journal, key_status: u16) -> Self {
            Self {
                key_status,
                ..Self::new(journal)
            }
        }

        pub fn with_run_status(journal: Journal, run_status: u16) -> Self {
            Self {
                run_status,
                ..Self::new(journal)
            }
        }

        pub fn run_count(&self) -> usize {
            self.runs.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn get_cage_key(&self) -> CagekitResult<CageKeyResponse> {
            self.key_fetches.fetch_add(1, Ordering::SeqCst);
            self.journal.lock().unwrap().push("fetch-key".to_string());
            // Hold the fetch open so concurrent callers overlap
            tokio::task::yield_now().await;

            if self.key_status == 401 {
                return Err(CagekitError::KeyFetchUnauthorized { status: 401 });
            }
            Ok(CageKeyResponse {
                key: "im-the-cage-key".to_string(),
            })
        }

        async fn run_cage(
            &self,
            cage_name: &str,
            payload: &Value,
            headers: &[(String, String)],
        ) -> CagekitResult<RunResponse> {
            self.journal.lock().unwrap().push("run-cage".to_string());
            self.runs.lock().unwrap().push((
                cage_name.to_string(),
                payload.clone(),
                headers.to_vec(),
            ));
            Ok(RunResponse {
                status: self.run_status,
                body: json!({"result": {"ok": true}}),
            })
        }
    }

    /// Deterministic "encryption": wraps data with the key it was
    /// encrypted under, preserving textual vs structured shape
    pub struct MarkCrypto {
        pub journal: Journal,
    }

    #[async_trait]
    impl CryptoProvider for MarkCrypto {
        async fn encrypt(
            &self,
            key: &CageKey,
            data: &Value,
            _options: &EncryptOptions,
        ) -> CagekitResult<Value> {
            self.journal.lock().unwrap().push("encrypt".to_string());
            Ok(match data {
                Value::String(s) => Value::String(format!("enc({}):{}", key.fetched_at.timestamp(), s)),
                other => json!({"$encrypted": other, "$key": key.material}),
            })
        }
    }

    pub struct ScriptedDeployer {
        pub deploys: AtomicUsize,
        pub versions: Mutex<Vec<u64>>,
    }

    impl ScriptedDeployer {
        pub fn new(versions: Vec<u64>) -> Self {
            Self {
                deploys: AtomicUsize::new(0),
                versions: Mutex::new(versions),
            }
        }
    }

    #[async_trait]
    impl DeployInvoker for ScriptedDeployer {
        async fn deploy(
            &self,
            cage_name: &str,
            _function: &FunctionDescriptor,
            _parameters: &[String],
            _required_bindings: &[String],
        ) -> CagekitResult<DeploymentReceipt> {
            self.deploys.fetch_add(1, Ordering::SeqCst);
            let mut versions = self.versions.lock().unwrap();
            if versions.is_empty() {
                return Err(CagekitError::DeployFailed {
                    cage: cage_name.to_string(),
                    reason: "no scripted versions left".to_string(),
                });
            }
            Ok(DeploymentReceipt {
                deployed_by: "dev@example.test".to_string(),
                deployed_team: "team-1".to_string(),
                deployed_version: versions.remove(0),
            })
        }
    }

    /// Fixed environment bindings, independent of process env
    pub struct StaticEnv(pub Value);

    #[async_trait]
    impl EnvironmentCollector for StaticEnv {
        async fn collect(&self, _function: &FunctionDescriptor) -> CagekitResult<Value> {
            Ok(self.0.clone())
        }
    }
}

mod encrypt_tests {
    use super::support::*;
    use cagekit::{Client, EncryptOptions};
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn client(transport: Arc<MockTransport>, journal: Journal) -> Client {
        Client::builder("test-api-key")
            .crypto(Arc::new(MarkCrypto { journal }))
            .transport(transport)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn concurrent_encrypts_fetch_key_once() {
        let journal = journal();
        let transport = Arc::new(MockTransport::new(journal.clone()));
        let client = client(transport.clone(), journal);

        let mut handles = Vec::new();
        for i in 0..8 {
            let client = client.clone();
            handles.push(tokio::spawn(async move {
                client
                    .encrypt(&json!({"n": i}), &EncryptOptions::default())
                    .await
                    .unwrap()
            }));
        }

        let mut keys = Vec::new();
        for handle in handles {
            let encrypted = handle.await.unwrap();
            keys.push(encrypted["$key"].clone());
        }

        assert_eq!(transport.key_fetches.load(Ordering::SeqCst), 1);
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
    }

    #[tokio::test]
    async fn failed_fetch_is_not_cached() {
        let journal = journal();
        let transport = Arc::new(MockTransport::with_key_status(journal.clone(), 401));
        let client = client(transport.clone(), journal.clone());

        let err = client
            .encrypt(&json!({"a": 1}), &EncryptOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_authorization());
        assert_eq!(transport.key_fetches.load(Ordering::SeqCst), 1);
        // The provider was never reached
        assert!(!journal.lock().unwrap().contains(&"encrypt".to_string()));

        // Next call retries with exactly one further fetch
        let _ = client
            .encrypt(&json!({"a": 1}), &EncryptOptions::default())
            .await
            .unwrap_err();
        assert_eq!(transport.key_fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn encrypt_preserves_textual_shape() {
        let journal = journal();
        let transport = Arc::new(MockTransport::new(journal.clone()));
        let client = client(transport, journal);

        let encrypted = client
            .encrypt(&json!("hello"), &EncryptOptions::default())
            .await
            .unwrap();
        assert!(encrypted.is_string());

        let encrypted = client
            .encrypt(&json!({"a": 1}), &EncryptOptions::default())
            .await
            .unwrap();
        assert!(encrypted.is_object());
    }
}

mod run_tests {
    use super::support::*;
    use cagekit::{Client, EncryptOptions, RunOptions};
    use serde_json::json;
    use std::sync::Arc;

    fn client(transport: Arc<MockTransport>, journal: Journal) -> Client {
        Client::builder("test-api-key")
            .crypto(Arc::new(MarkCrypto { journal }))
            .transport(transport)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn array_payload_rejected_without_network() {
        let journal = journal();
        let transport = Arc::new(MockTransport::new(journal.clone()));
        let client = client(transport.clone(), journal);

        let err = client
            .run("cage", &json!([1, 2, 3]), &RunOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(transport.run_count(), 0);
    }

    #[tokio::test]
    async fn empty_cage_name_rejected_without_network() {
        let journal = journal();
        let transport = Arc::new(MockTransport::new(journal.clone()));
        let client = client(transport.clone(), journal);

        let err = client
            .run("", &json!({"a": 1}), &RunOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(transport.run_count(), 0);
    }

    #[tokio::test]
    async fn encrypt_and_run_encrypts_then_runs() {
        let journal = journal();
        let transport = Arc::new(MockTransport::new(journal.clone()));
        let client = client(transport.clone(), journal.clone());

        client
            .encrypt_and_run("test-cage", &json!({"a": 1}), &EncryptOptions::default())
            .await
            .unwrap();

        let order = journal.lock().unwrap().clone();
        assert_eq!(order, vec!["fetch-key", "encrypt", "run-cage"]);

        let runs = transport.runs.lock().unwrap();
        let (cage, payload, _headers) = &runs[0];
        assert_eq!(cage, "test-cage");
        assert_eq!(payload["$encrypted"], json!({"a": 1}));
        assert!(payload["$key"]
            .as_str()
            .unwrap()
            .contains("im-the-cage-key"));
    }

    #[tokio::test]
    async fn run_unauthorized_surfaces_as_authorization_error() {
        let journal = journal();
        let transport = Arc::new(MockTransport::with_run_status(journal.clone(), 401));
        let client = client(transport, journal);

        let err = client
            .run("cage", &json!({"a": 1}), &RunOptions::default())
            .await
            .unwrap_err();
        assert!(err.is_authorization());
    }
}

mod cagify_tests {
    use super::support::*;
    use cagekit::{CagekitError, Client, FunctionDescriptor};
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn descriptor(source: &str) -> FunctionDescriptor {
        FunctionDescriptor::new(
            "add",
            source,
            vec!["x".to_string(), "y".to_string()],
            vec!["API_TOKEN".to_string()],
        )
    }

    struct Harness {
        client: Client,
        transport: Arc<MockTransport>,
        deployer: Arc<ScriptedDeployer>,
        _lock_dir: TempDir,
    }

    fn harness(versions: Vec<u64>, run_status: u16) -> Harness {
        let journal = journal();
        let transport = Arc::new(MockTransport::with_run_status(journal.clone(), run_status));
        let deployer = Arc::new(ScriptedDeployer::new(versions));
        let lock_dir = TempDir::new().unwrap();

        let client = Client::builder("test-api-key")
            .crypto(Arc::new(MarkCrypto { journal }))
            .transport(transport.clone())
            .deployer(deployer.clone())
            .environment(Arc::new(StaticEnv(json!({"API_TOKEN": "tok-123"}))))
            .lock_store(Arc::new(cagekit::lock::FileLockStore::new(
                lock_dir.path().join("cage-lock.json"),
            )))
            .build()
            .unwrap();

        Harness {
            client,
            transport,
            deployer,
            _lock_dir: lock_dir,
        }
    }

    #[tokio::test]
    async fn call_sends_mapped_args_and_encrypted_environment() {
        let h = harness(vec![1], 200);

        let caged = h.client.cagify("add-cage", &descriptor("x + y")).await.unwrap();
        let result = caged.call(&[json!(5), json!(10)]).await.unwrap();
        assert_eq!(result, json!({"ok": true}));

        let runs = h.transport.runs.lock().unwrap();
        let (cage, payload, headers) = &runs[0];
        assert_eq!(cage, "add-cage");
        assert_eq!(payload["data"], json!({"x": 5, "y": 10}));
        // Environment went through the crypto provider, not in the clear
        assert_eq!(payload["environment"]["$encrypted"], json!({"API_TOKEN": "tok-123"}));
        assert!(headers.contains(&("x-cage-version".to_string(), "1".to_string())));
    }

    #[tokio::test]
    async fn extra_args_dropped_missing_args_unset() {
        let h = harness(vec![1], 200);
        let caged = h.client.cagify("add-cage", &descriptor("x + y")).await.unwrap();

        caged
            .call(&[json!(1), json!(2), json!(3), json!(4)])
            .await
            .unwrap();
        caged.call(&[json!(9)]).await.unwrap();

        let runs = h.transport.runs.lock().unwrap();
        assert_eq!(runs[0].1["data"], json!({"x": 1, "y": 2}));
        assert_eq!(runs[1].1["data"], json!({"x": 9}));
    }

    #[tokio::test]
    async fn rewrapping_unchanged_source_never_redeploys() {
        let h = harness(vec![1, 2], 200);

        let first = h.client.cagify("add-cage", &descriptor("x + y")).await.unwrap();
        let second = h.client.cagify("add-cage", &descriptor("x + y")).await.unwrap();

        assert_eq!(h.deployer.deploys.load(Ordering::SeqCst), 1);
        assert_eq!(first.version(), 1);
        assert_eq!(second.version(), 1);
    }

    #[tokio::test]
    async fn changed_source_redeploys_but_pins_survive() {
        let h = harness(vec![1, 2], 200);

        let old = h.client.cagify("add-cage", &descriptor("x + y")).await.unwrap();
        let new = h.client.cagify("add-cage", &descriptor("x * y")).await.unwrap();

        assert_eq!(h.deployer.deploys.load(Ordering::SeqCst), 2);
        assert_eq!(old.version(), 1);
        assert_eq!(new.version(), 2);

        // The old callable still sends its wrap-time version
        old.call(&[json!(1), json!(2)]).await.unwrap();
        new.call(&[json!(1), json!(2)]).await.unwrap();

        let runs = h.transport.runs.lock().unwrap();
        assert!(runs[0]
            .2
            .contains(&("x-cage-version".to_string(), "1".to_string())));
        assert!(runs[1]
            .2
            .contains(&("x-cage-version".to_string(), "2".to_string())));
    }

    #[tokio::test]
    async fn mismatch_status_is_a_descriptive_identity_error() {
        let h = harness(vec![1], 404);
        let caged = h.client.cagify("add-cage", &descriptor("x + y")).await.unwrap();

        let err = caged.call(&[json!(1), json!(2)]).await.unwrap_err();
        assert!(matches!(err, CagekitError::IdentityMismatch { .. }));
        assert!(err.to_string().contains("add-cage"));
        assert!(err.is_authorization());
    }

    #[tokio::test]
    async fn empty_cage_name_rejected_before_analysis() {
        let h = harness(vec![1], 200);

        let err = h.client.cagify("", &descriptor("x + y")).await.unwrap_err();
        assert!(matches!(err, CagekitError::CageNameInvalid));
        assert_eq!(h.deployer.deploys.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn deploy_failure_propagates() {
        let h = harness(vec![], 200);

        let err = h.client.cagify("add-cage", &descriptor("x + y")).await.unwrap_err();
        assert!(matches!(err, CagekitError::DeployFailed { .. }));
    }
}
