//! Startup configuration
//!
//! [`Config`] is resolved once from the command line and environment and
//! then only read. Every error here is fatal at startup; nothing in this
//! module runs per cycle.

use crate::cli::{Cli, StoreBackend, SERVICE_ACCOUNT_CA};
use crate::interface::SecretStore;
use crate::store::{KubernetesConfig, KubernetesSecretStore, SqliteSecretStore, TokenSource};
use crate::vault::{VaultClient, VaultConfig};
use reqwest::Url;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// kubectl proxy, used when no in-cluster API address is configured.
pub const KUBECTL_PROXY_URL: &str = "http://localhost:8001";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid Vault address {0:?}: {1}")]
    InvalidVaultAddr(String, String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Secret name must not be empty")]
    EmptySecretName,

    #[error("Kubernetes API address needs both host and port, got {0}")]
    IncompleteKubernetesAddr(String),

    #[error("Failed to read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to build client: {0}")]
    Client(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreConfig {
    Kubernetes(KubernetesConfig),
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub vault: VaultConfig,
    pub check_interval: Duration,
    pub secret_name: String,
    pub store: StoreConfig,
}

fn read_pem(path: &Path) -> Result<Vec<u8>, ConfigError> {
    std::fs::read(path).map_err(|source| ConfigError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

fn kubernetes_api_url(host: Option<&str>, port: Option<u16>) -> Result<String, ConfigError> {
    match (host.filter(|h| !h.is_empty()), port) {
        (Some(host), Some(port)) if host.contains(':') => Ok(format!("https://[{}]:{}", host, port)),
        (Some(host), Some(port)) => Ok(format!("https://{}:{}", host, port)),
        (None, None) => Ok(KUBECTL_PROXY_URL.to_string()),
        (Some(host), None) => Err(ConfigError::IncompleteKubernetesAddr(format!(
            "host {} without port",
            host
        ))),
        (None, Some(port)) => Err(ConfigError::IncompleteKubernetesAddr(format!(
            "port {} without host",
            port
        ))),
    }
}

impl Config {
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let url = Url::parse(&cli.vault_addr)
            .map_err(|e| ConfigError::InvalidVaultAddr(cli.vault_addr.clone(), e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
            return Err(ConfigError::InvalidVaultAddr(
                cli.vault_addr.clone(),
                "expected an http(s) URL with a host".to_string(),
            ));
        }
        if cli.check_interval == 0 {
            return Err(ConfigError::ZeroDuration("check interval"));
        }
        if cli.request_timeout == 0 {
            return Err(ConfigError::ZeroDuration("request timeout"));
        }
        if cli.secret_name.trim().is_empty() {
            return Err(ConfigError::EmptySecretName);
        }
        let timeout = Duration::from_secs(cli.request_timeout);

        let vault = VaultConfig {
            timeout,
            ca_cert_pem: cli.vault_cacert.as_deref().map(read_pem).transpose()?,
            skip_verify: cli.vault_skip_verify,
            ..VaultConfig::new(&cli.vault_addr)
        };

        let store = match cli.store {
            StoreBackend::Kubernetes => {
                let ca_path = cli.kubernetes_ca_file.clone().or_else(|| {
                    let default = PathBuf::from(SERVICE_ACCOUNT_CA);
                    default.exists().then_some(default)
                });
                StoreConfig::Kubernetes(KubernetesConfig {
                    api_url: kubernetes_api_url(cli.kubernetes_host.as_deref(), cli.kubernetes_port)?,
                    namespace: cli.namespace.clone(),
                    token: TokenSource::File(cli.kubernetes_token_file.clone()),
                    ca_cert_pem: ca_path.as_deref().map(read_pem).transpose()?,
                    timeout,
                })
            }
            StoreBackend::Sqlite => StoreConfig::Sqlite {
                path: cli.sqlite_path.clone(),
            },
        };

        Ok(Self {
            vault,
            check_interval: Duration::from_secs(cli.check_interval),
            secret_name: cli.secret_name.clone(),
            store,
        })
    }

    pub fn vault_client(&self) -> Result<VaultClient, ConfigError> {
        VaultClient::new(&self.vault).map_err(|e| ConfigError::Client(e.to_string()))
    }

    pub fn secret_store(&self) -> Result<Arc<dyn SecretStore>, ConfigError> {
        let store: Arc<dyn SecretStore> = match &self.store {
            StoreConfig::Kubernetes(k8s) => Arc::new(
                KubernetesSecretStore::new(k8s).map_err(|e| ConfigError::Client(e.to_string()))?,
            ),
            StoreConfig::Sqlite { path } => Arc::new(
                SqliteSecretStore::new(path).map_err(|e| ConfigError::Client(e.to_string()))?,
            ),
        };
        Ok(store)
    }
}
