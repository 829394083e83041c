use crate::store::{PersistedSecretRecord, StoreError};
use crate::vault::{KeyShareSet, UnsealProgress, VaultError, VaultHealth};
use async_trait::async_trait;

/// Vault protocol operations the orchestrator drives.
#[async_trait]
pub trait VaultApi: Send + Sync {
    /// Probe health without mutating Vault state.
    async fn probe(&self) -> Result<VaultHealth, VaultError>;

    /// One-time initialization into `shares` key shares, `threshold` of
    /// which are required to unseal.
    async fn initialize(&self, shares: usize, threshold: usize)
        -> Result<KeyShareSet, VaultError>;

    /// Submit one unseal key share.
    async fn submit_share(&self, share: &str) -> Result<UnsealProgress, VaultError>;
}

/// Create-once storage for the key shares of one Vault instance.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Whether a record with this name exists. Absence is not an error.
    async fn exists(&self, name: &str) -> Result<bool, StoreError>;

    /// Create the record. Fails with [`StoreError::Conflict`] rather than
    /// overwriting an existing one.
    async fn save(&self, name: &str, record: &PersistedSecretRecord) -> Result<(), StoreError>;

    /// Fetch the record, [`StoreError::NotFound`] if absent.
    async fn load(&self, name: &str) -> Result<PersistedSecretRecord, StoreError>;
}
