//! Client implementation for the Vault system endpoints.
//!
//! This module provides a client for the three calls the sidecar makes:
//! the health probe, one-time initialization and unseal key submission.

use crate::interface::VaultApi;
use crate::vault::init::{InitRequest, InitResponse, UnsealRequest};
use crate::vault::{KeyShareSet, UnsealProgress, VaultError, VaultHealth};
use async_trait::async_trait;
use reqwest::{Certificate, Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info};

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("vault-init/", env!("CARGO_PKG_VERSION"));

/// Transport settings for the Vault HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub struct VaultConfig {
    /// Vault API URL, e.g., "http://127.0.0.1:8200".
    pub url: String,
    /// Overall deadline for a single request.
    pub timeout: Duration,
    /// Optional PEM CA bundle used to verify the server
    pub ca_cert_pem: Option<Vec<u8>>,
    /// Accept any server certificate
    pub skip_verify: bool,
}

impl VaultConfig {
    /// Create a new Vault config with default transport settings
    pub fn new(url: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8200".to_string(),
            timeout: Duration::from_secs(30),
            ca_cert_pem: None,
            skip_verify: false,
        }
    }
}

/// Client for interacting with the Vault HTTP API.
pub struct VaultClient {
    /// Base URL of the Vault server
    pub addr: String,
    /// HTTP client for making requests
    client: Client,
}

impl VaultClient {
    /// Creates a new VaultClient from a transport configuration.
    pub fn new(config: &VaultConfig) -> Result<Self, VaultError> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT);

        if let Some(pem) = &config.ca_cert_pem {
            let cert = Certificate::from_pem(pem)
                .map_err(|e| VaultError::Config(format!("Invalid Vault CA bundle: {}", e)))?;
            builder = builder.add_root_certificate(cert);
        }
        if config.skip_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder
            .build()
            .map_err(|e| VaultError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            addr: config.url.clone(),
            client,
        })
    }

    /// Sends a PUT with a JSON body and deserializes a 200 response.
    async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, VaultError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.addr, path);
        debug!("PUT {}", url);

        let response = self
            .client
            .request(Method::PUT, &url)
            .json(body)
            .send()
            .await
            .map_err(|e| VaultError::Unreachable(format!("Request to {} failed: {}", url, e)))?;

        let response = check_status(response).await?;
        let text = response
            .text()
            .await
            .map_err(|e| VaultError::Unreachable(format!("Failed to read response: {}", e)))?;
        serde_json::from_str(&text)
            .map_err(|e| VaultError::Decode(format!("Failed to parse response from {}: {}", path, e)))
    }
}

/// Passes 200 responses through; anything else becomes a protocol error
/// carrying the first message of Vault's `errors` array when present.
async fn check_status(response: Response) -> Result<Response, VaultError> {
    let status = response.status();
    if status == reqwest::StatusCode::OK {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if let Ok(val) = serde_json::from_str::<serde_json::Value>(&body) {
        if let Some(msg) = val
            .get("errors")
            .and_then(|v| v.as_array())
            .and_then(|errors| errors.first())
            .and_then(|first| first.as_str())
        {
            return Err(VaultError::HttpStatus(status.as_u16(), msg.to_string()));
        }
    }
    Err(VaultError::HttpStatus(status.as_u16(), body))
}

#[async_trait]
impl VaultApi for VaultClient {
    async fn probe(&self) -> Result<VaultHealth, VaultError> {
        let url = format!("{}/v1/sys/health", self.addr);
        debug!("Probing Vault health at {}", url);

        let response = self.client.head(&url).send().await.map_err(|e| {
            info!("Failed to connect to Vault at {}: {}", self.addr, e);
            VaultError::Unreachable(e.to_string())
        })?;

        let code = response.status().as_u16();
        debug!("Vault health status code: {}", code);
        Ok(VaultHealth::from_status(code))
    }

    async fn initialize(
        &self,
        shares: usize,
        threshold: usize,
    ) -> Result<KeyShareSet, VaultError> {
        info!(
            "Initializing Vault at {} with {} shares, threshold {}",
            self.addr, shares, threshold
        );
        let req = InitRequest {
            secret_shares: shares,
            secret_threshold: threshold,
        };
        let resp: InitResponse = self.put_json("/v1/sys/init", &req).await?;
        if resp.root_token.is_empty() {
            return Err(VaultError::Decode(
                "Init response carried an empty root token".to_string(),
            ));
        }
        if resp.keys.len() != shares {
            return Err(VaultError::Decode(format!(
                "Init response carried {} unseal keys, {} were requested",
                resp.keys.len(),
                shares
            )));
        }
        Ok(resp.into())
    }

    async fn submit_share(&self, share: &str) -> Result<UnsealProgress, VaultError> {
        let progress: UnsealProgress = self
            .put_json("/v1/sys/unseal", &UnsealRequest { key: share })
            .await?;
        debug!(
            "Unseal progress {}/{} (sealed: {})",
            progress.progress, progress.threshold, progress.sealed
        );
        Ok(progress)
    }
}
