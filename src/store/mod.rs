//! Secret store module
//!
//! Persistence for the key shares produced by Vault init. A record is
//! created at most once per Vault instance; its presence is what tells the
//! orchestrator that init already happened.

pub mod error;
pub mod kubernetes;
#[cfg(test)]
pub mod memory;
pub mod record;
pub mod sqlite;

pub use error::StoreError;
pub use kubernetes::{KubernetesConfig, KubernetesSecretStore, TokenSource};
pub use record::{decode_value, encode_value, PersistedSecretRecord};
pub use sqlite::SqliteSecretStore;
