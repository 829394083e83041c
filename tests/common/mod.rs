//! Shared fixtures for the HTTP-level tests.
//!
//! A single wiremock server plays both Vault and the Kubernetes API; their
//! paths never overlap, and one server keeps the request order of both
//! services in a single log.

use serde_json::{json, Value};
use std::time::Duration;
use vault_init::store::{KubernetesConfig, KubernetesSecretStore, TokenSource};
use vault_init::vault::{VaultClient, VaultConfig};
use wiremock::MockServer;

pub const NAMESPACE: &str = "vault";
pub const SECRET_NAME: &str = "vault-tokens";
pub const SECRETS_PATH: &str = "/api/v1/namespaces/vault/secrets";
pub const SECRET_PATH: &str = "/api/v1/namespaces/vault/secrets/vault-tokens";

/// Set up logging for tests
#[allow(dead_code)]
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub fn vault_client(server: &MockServer) -> VaultClient {
    VaultClient::new(&VaultConfig {
        timeout: Duration::from_secs(5),
        ..VaultConfig::new(&server.uri())
    })
    .unwrap()
}

#[allow(dead_code)]
pub fn kubernetes_store(server: &MockServer, token: TokenSource) -> KubernetesSecretStore {
    KubernetesSecretStore::new(&KubernetesConfig {
        api_url: server.uri(),
        namespace: NAMESPACE.to_string(),
        token,
        ca_cert_pem: None,
        timeout: Duration::from_secs(5),
    })
    .unwrap()
}

/// Five hex unseal keys, as Vault returns them.
#[allow(dead_code)]
pub fn unseal_keys() -> Vec<String> {
    (1..=5u32).map(|i| format!("{:064x}", i * 65537)).collect()
}

#[allow(dead_code)]
pub fn init_response_body(root_token: &str, keys: &[String]) -> Value {
    json!({
        "keys": keys,
        "keys_base64": keys,
        "root_token": root_token,
    })
}

#[allow(dead_code)]
pub fn unseal_body(sealed: bool, progress: u32) -> Value {
    json!({
        "type": "shamir",
        "initialized": true,
        "sealed": sealed,
        "t": 3,
        "n": 5,
        "progress": progress,
        "nonce": "",
        "version": "1.18.4",
    })
}

/// A Kubernetes Secret as the API server returns it.
#[allow(dead_code)]
pub fn secret_body(root_token: &str, keys: &[String]) -> Value {
    use base64::{engine::general_purpose::STANDARD, Engine};
    let mut data = serde_json::Map::new();
    data.insert("root-token".to_string(), json!(STANDARD.encode(root_token)));
    for (i, key) in keys.iter().enumerate() {
        data.insert(format!("unseal-key-{}", i + 1), json!(STANDARD.encode(key)));
    }
    json!({
        "kind": "Secret",
        "apiVersion": "v1",
        "metadata": { "name": SECRET_NAME, "namespace": NAMESPACE, "resourceVersion": "4711" },
        "type": "Opaque",
        "data": data,
    })
}
