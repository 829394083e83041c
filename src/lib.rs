//! vault-init - keeps a Vault server initialized and unsealed
//!
//! This crate implements a sidecar that polls Vault's health endpoint and
//! drives its init/unseal protocol without an operator. On first boot it
//! initializes Vault and persists the root token and unseal keys in a secret
//! store; on every later sealed state it replays the persisted keys.
//!
//! ## Architecture
//!
//! - `poll` module - fixed-interval loop, owns shutdown
//! - `orchestrator` module - the per-cycle state machine
//! - `vault` module - Vault HTTP client (health, init, unseal)
//! - `store` module - secret store backends (Kubernetes Secret, SQLite)
//! - `interface` module - the traits the orchestrator is written against
//! - `config` / `cli` modules - startup configuration and the binary entry
//!
//! The orchestrator only sees the `VaultApi` and `SecretStore` traits, so
//! backends and test doubles plug in without touching the state machine.

pub mod cli;
pub mod config;
pub mod interface;
pub mod orchestrator;
pub mod poll;
pub mod store;
pub mod vault;

// Re-export public types for convenience
pub use interface::{SecretStore, VaultApi};
pub use orchestrator::{CycleError, CycleOutcome, Orchestrator};
pub use poll::PollLoop;

/// Initialize logging for tests
#[cfg(test)]
pub(crate) fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer() // This ensures output goes to both stdout and test output
        .try_init();
}
