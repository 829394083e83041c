//! Vault module for the vault-init sidecar
//!
//! This module implements the client side of Vault's initialization and
//! unseal protocol. It never implements sealing itself; it only observes
//! health and submits key shares.
//!
//! ## Testing strategy:
//! - Each module contains its own unit tests within a `#[cfg(test)] mod tests` block
//! - Tests needing a real server use Docker containers via `test_utils.rs`
//! - HTTP-level behaviour against a mock server is covered in `tests/`

pub mod client;
pub mod error;
pub mod init;
pub mod status;
#[cfg(test)]
pub mod test_utils;

// Re-export key types and traits for convenience
pub use client::{VaultClient, VaultConfig};
pub use error::VaultError;
pub use init::{KeyShareSet, UnsealProgress};
pub use status::VaultHealth;

/// Number of key shares created during init.
pub const NUM_TOKENS: usize = 5;

/// Number of key shares required to unseal.
pub const TOKENS_REQUIRED: usize = 3;

const _: () = assert!(TOKENS_REQUIRED <= NUM_TOKENS);
