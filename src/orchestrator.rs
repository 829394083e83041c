//! Status-driven init/unseal state machine
//!
//! Each cycle probes Vault once and acts on what it sees. The machine is
//! level-triggered: nothing is carried between cycles, so a cycle run
//! against an unsealed or standby Vault is a no-op and a cycle run against a
//! sealed Vault always recovers from the persisted record.

use crate::interface::{SecretStore, VaultApi};
use crate::store::{PersistedSecretRecord, StoreError};
use crate::vault::{UnsealProgress, VaultError, VaultHealth, NUM_TOKENS, TOKENS_REQUIRED};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// What a successful cycle observed or did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The probe failed at the transport level; nothing was attempted.
    Unreachable,
    AlreadyUnsealed,
    Standby,
    /// First boot: initialized, persisted and unsealed.
    Initialized { progress: UnsealProgress },
    /// Sealed Vault recovered from the persisted record.
    Unsealed { progress: UnsealProgress },
    /// Unrecognized health status code; no action taken.
    UnknownState(u16),
}

#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    #[error("Secret store error: {0}")]
    Store(#[from] StoreError),

    #[error("Vault reports it is not initialized but secret {0} already exists; refusing to re-initialize")]
    InconsistentState(String),

    #[error("Vault is sealed but secret {0} does not exist; unseal keys cannot be recovered")]
    MissingShares(String),

    #[error("Vault returned {have} unseal keys, expected {need}")]
    InsufficientShares { have: usize, need: usize },

    #[error("Vault still sealed after submitting {submitted} unseal keys")]
    StillSealed {
        submitted: usize,
        progress: Option<UnsealProgress>,
    },
}

impl CycleError {
    /// Conditions an operator has to resolve; retrying alone will not help.
    pub fn is_alerting(&self) -> bool {
        match self {
            CycleError::Vault(e) => !e.is_transient(),
            CycleError::Store(e) => matches!(e, StoreError::Conflict(_) | StoreError::Decode(_)),
            _ => true,
        }
    }
}

/// Bounded retry of the save that follows a successful init.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay: Duration::from_secs(2),
        }
    }
}

pub struct Orchestrator {
    vault: Arc<dyn VaultApi>,
    store: Arc<dyn SecretStore>,
    secret_name: String,
    save_retry: RetryPolicy,
}

impl Orchestrator {
    pub fn new<S: Into<String>>(
        vault: Arc<dyn VaultApi>,
        store: Arc<dyn SecretStore>,
        secret_name: S,
    ) -> Self {
        Self {
            vault,
            store,
            secret_name: secret_name.into(),
            save_retry: RetryPolicy::default(),
        }
    }

    pub fn with_save_retry(mut self, policy: RetryPolicy) -> Self {
        self.save_retry = policy;
        self
    }

    /// Runs one probe-and-act cycle.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let health = match self.vault.probe().await {
            Ok(health) => health,
            Err(e) if e.is_transient() => {
                warn!("Vault health probe failed: {}", e);
                return Ok(CycleOutcome::Unreachable);
            }
            Err(e) => return Err(e.into()),
        };

        match health {
            VaultHealth::Unsealed => {
                info!("Vault is initialized and unsealed.");
                Ok(CycleOutcome::AlreadyUnsealed)
            }
            VaultHealth::Standby => {
                info!("Vault is unsealed and in standby mode.");
                Ok(CycleOutcome::Standby)
            }
            VaultHealth::Uninitialized => {
                info!("Vault is not initialized. Initializing and unsealing...");
                self.initialize_and_unseal().await
            }
            VaultHealth::Sealed => {
                info!("Vault is sealed. Unsealing...");
                self.unseal_from_store().await
            }
            VaultHealth::Unknown(code) => {
                warn!("Vault is in an unknown state. Status code: {}", code);
                Ok(CycleOutcome::UnknownState(code))
            }
        }
    }

    async fn initialize_and_unseal(&self) -> Result<CycleOutcome, CycleError> {
        // A record means an earlier init already issued a root token.
        if self.store.exists(&self.secret_name).await? {
            return Err(CycleError::InconsistentState(self.secret_name.clone()));
        }

        let set = self.vault.initialize(NUM_TOKENS, TOKENS_REQUIRED).await?;
        // A short set must never reach the write-once record.
        if set.shares.len() != NUM_TOKENS {
            return Err(CycleError::InsufficientShares {
                have: set.shares.len(),
                need: NUM_TOKENS,
            });
        }
        info!("Vault initialized with {} unseal keys", set.shares.len());

        // Persist before the first unseal submission.
        self.save_with_retry(&PersistedSecretRecord::from_key_shares(&set))
            .await?;

        let progress = self.submit_shares(&set.shares[..TOKENS_REQUIRED]).await?;
        info!("Initialization complete.");
        Ok(CycleOutcome::Initialized { progress })
    }

    async fn unseal_from_store(&self) -> Result<CycleOutcome, CycleError> {
        if !self.store.exists(&self.secret_name).await? {
            return Err(CycleError::MissingShares(self.secret_name.clone()));
        }
        let record = self.store.load(&self.secret_name).await?;
        let shares = record.decode_shares(TOKENS_REQUIRED)?;
        debug!("Loaded {} unseal keys from {}", shares.len(), self.secret_name);

        let progress = self.submit_shares(&shares).await?;
        info!("Vault unsealed.");
        Ok(CycleOutcome::Unsealed { progress })
    }

    async fn save_with_retry(&self, record: &PersistedSecretRecord) -> Result<(), CycleError> {
        let attempts = self.save_retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.store.save(&self.secret_name, record).await {
                Ok(()) => {
                    info!("Unseal keys and root token written to {}", self.secret_name);
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!(
                        "Failed to save {} (attempt {}/{}): {}",
                        self.secret_name, attempt, attempts, e
                    );
                    attempt += 1;
                    tokio::time::sleep(self.save_retry.delay).await;
                }
                Err(StoreError::Conflict(_)) if attempt > 1 && self.is_own_record(record).await => {
                    info!(
                        "Secret {} was created by an earlier attempt that reported failure",
                        self.secret_name
                    );
                    return Ok(());
                }
                Err(e) => {
                    error!(
                        "Vault was initialized but its unseal keys could not be saved to {}: {}",
                        self.secret_name, e
                    );
                    return Err(e.into());
                }
            }
        }
    }

    /// Whether the stored record is exactly the one this cycle tried to save.
    async fn is_own_record(&self, record: &PersistedSecretRecord) -> bool {
        match self.store.load(&self.secret_name).await {
            Ok(existing) => existing == *record,
            Err(e) => {
                warn!("Failed to read back {}: {}", self.secret_name, e);
                false
            }
        }
    }

    /// Submits shares one at a time, stopping as soon as Vault is unsealed.
    async fn submit_shares(&self, shares: &[String]) -> Result<UnsealProgress, CycleError> {
        let mut last = None;
        for (i, share) in shares.iter().enumerate() {
            let progress = self.vault.submit_share(share).await?;
            debug!(
                "Submitted unseal key {}/{}: progress {}/{}",
                i + 1,
                shares.len(),
                progress.progress,
                progress.threshold
            );
            if !progress.sealed {
                return Ok(progress);
            }
            last = Some(progress);
        }
        Err(CycleError::StillSealed {
            submitted: shares.len(),
            progress: last,
        })
    }
}
