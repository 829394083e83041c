//! Kubernetes Secret backend.
//!
//! Records live in core/v1 Secrets under
//! `/api/v1/namespaces/<namespace>/secrets`. The `data` map holds
//! `root-token` and `unseal-key-1 .. unseal-key-N`, already base64 encoded
//! as Kubernetes expects.

use crate::interface::SecretStore;
use crate::store::{PersistedSecretRecord, StoreError};
use async_trait::async_trait;
use reqwest::{Certificate, Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

const ROOT_TOKEN_KEY: &str = "root-token";
const SHARE_KEY_PREFIX: &str = "unseal-key-";

/// Where the API bearer token comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenSource {
    None,
    Static(String),
    /// Re-read on every request so rotated service account tokens apply.
    File(PathBuf),
}

impl TokenSource {
    async fn resolve(&self) -> Result<Option<String>, StoreError> {
        match self {
            TokenSource::None => Ok(None),
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::File(path) => match tokio::fs::read_to_string(path).await {
                Ok(token) => Ok(Some(token.trim().to_string()).filter(|t| !t.is_empty())),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(StoreError::Backend(format!(
                    "Failed to read token file {}: {}",
                    path.display(),
                    e
                ))),
            },
        }
    }
}

/// Settings for [`KubernetesSecretStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct KubernetesConfig {
    /// API server base URL, e.g. "https://10.0.0.1:443"
    pub api_url: String,
    pub namespace: String,
    pub token: TokenSource,
    /// Optional PEM CA bundle for the API server
    pub ca_cert_pem: Option<Vec<u8>>,
    pub timeout: Duration,
}

#[derive(Debug, Serialize, Deserialize)]
struct Secret {
    kind: String,
    #[serde(rename = "apiVersion")]
    api_version: String,
    metadata: Metadata,
    #[serde(default)]
    data: BTreeMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Metadata {
    name: String,
}

impl Secret {
    fn from_record(name: &str, record: &PersistedSecretRecord) -> Self {
        let mut data = BTreeMap::new();
        data.insert(ROOT_TOKEN_KEY.to_string(), record.root_token.clone());
        for (i, share) in record.shares.iter().enumerate() {
            data.insert(format!("{}{}", SHARE_KEY_PREFIX, i + 1), share.clone());
        }
        Self {
            kind: "Secret".to_string(),
            api_version: "v1".to_string(),
            metadata: Metadata {
                name: name.to_string(),
            },
            data,
        }
    }

    fn into_record(self) -> Result<PersistedSecretRecord, StoreError> {
        let name = self.metadata.name;
        let mut data = self.data;
        let root_token = data
            .remove(ROOT_TOKEN_KEY)
            .ok_or_else(|| StoreError::Decode(format!("secret {} has no {}", name, ROOT_TOKEN_KEY)))?;

        let mut indexed = Vec::new();
        for (key, value) in data {
            if let Some(index) = key.strip_prefix(SHARE_KEY_PREFIX) {
                let index: usize = index.parse().map_err(|_| {
                    StoreError::Decode(format!("secret {} has malformed key {}", name, key))
                })?;
                indexed.push((index, value));
            }
        }
        indexed.sort_by_key(|(index, _)| *index);

        for (position, (index, _)) in indexed.iter().enumerate() {
            if *index != position + 1 {
                return Err(StoreError::Decode(format!(
                    "secret {} is missing {}{}",
                    name,
                    SHARE_KEY_PREFIX,
                    position + 1
                )));
            }
        }

        Ok(PersistedSecretRecord {
            root_token,
            shares: indexed.into_iter().map(|(_, value)| value).collect(),
        })
    }
}

/// Secret store backed by the Kubernetes API.
pub struct KubernetesSecretStore {
    secrets_url: String,
    token: TokenSource,
    client: Client,
}

impl KubernetesSecretStore {
    pub fn new(config: &KubernetesConfig) -> Result<Self, StoreError> {
        let mut builder = Client::builder().timeout(config.timeout);
        if let Some(pem) = &config.ca_cert_pem {
            let cert = Certificate::from_pem(pem)
                .map_err(|e| StoreError::Backend(format!("Invalid Kubernetes CA bundle: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::Backend(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            secrets_url: format!(
                "{}/api/v1/namespaces/{}/secrets",
                config.api_url.trim_end_matches('/'),
                config.namespace
            ),
            token: config.token.clone(),
            client,
        })
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, StoreError> {
        let request = request.header("Accept", "application/json");
        Ok(match self.token.resolve().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn get(&self, name: &str) -> Result<Option<Secret>, StoreError> {
        let url = format!("{}/{}", self.secrets_url, name);
        debug!("GET {}", url);
        let response = self
            .authorized(self.client.get(&url))
            .await?
            .send()
            .await
            .map_err(|e| StoreError::Unreachable(format!("Request to {} failed: {}", url, e)))?;

        match response.status() {
            StatusCode::OK => {
                let secret = response
                    .json::<Secret>()
                    .await
                    .map_err(|e| StoreError::Decode(format!("Failed to parse secret {}: {}", name, e)))?;
                Ok(Some(secret))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = response.text().await.unwrap_or_default();
                warn!("Reading secret {} failed with status {}", name, status);
                Err(StoreError::Backend(format!("HTTP status {}: {}", status, body)))
            }
        }
    }
}

#[async_trait]
impl SecretStore for KubernetesSecretStore {
    async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.get(name).await?.is_some())
    }

    async fn save(&self, name: &str, record: &PersistedSecretRecord) -> Result<(), StoreError> {
        let secret = Secret::from_record(name, record);
        debug!("POST {}", self.secrets_url);
        let response = self
            .authorized(self.client.post(&self.secrets_url))
            .await?
            .json(&secret)
            .send()
            .await
            .map_err(|e| {
                StoreError::Unreachable(format!("Request to {} failed: {}", self.secrets_url, e))
            })?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => {
                info!("Created secret {} with {} shares", name, record.shares.len());
                Ok(())
            }
            StatusCode::CONFLICT => Err(StoreError::Conflict(name.to_string())),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StoreError::Backend(format!("HTTP status {}: {}", status, body)))
            }
        }
    }

    async fn load(&self, name: &str) -> Result<PersistedSecretRecord, StoreError> {
        match self.get(name).await? {
            Some(secret) => secret.into_record(),
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }
}
